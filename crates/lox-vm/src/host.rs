//! The VM's only point of contact with the outside world: `print` output.
//! (`clock()` reads the system clock directly, same as the original.)

use std::cell::RefCell;
use std::rc::Rc;

/// Host environment for output. Swappable so tests can capture `print`
/// output instead of writing to stdout.
pub trait Host {
    fn print(&mut self, s: &str);
}

/// Default host: prints to stdout.
#[derive(Default)]
pub struct StdHost;

impl Host for StdHost {
    fn print(&mut self, s: &str) {
        println!("{s}");
    }
}

/// Test host: captures printed lines in a handle the test keeps, since
/// `Vm::with_host` takes ownership of the `Box<dyn Host>` itself.
#[derive(Clone, Default)]
pub struct CapturingHost(pub Rc<RefCell<Vec<String>>>);

impl Host for CapturingHost {
    fn print(&mut self, s: &str) {
        self.0.borrow_mut().push(s.to_string());
    }
}
