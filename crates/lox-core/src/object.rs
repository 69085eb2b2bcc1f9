//! Heap objects: interned strings, compiled functions, natives, closures and
//! upvalues.
//!
//! The spec's object header is `{kind, next}`, an intrusive list so a future
//! mark-sweep collector can walk every live allocation. Safe Rust has no raw
//! intrusive pointers, so [`Heap`] plays that role instead: every allocation
//! is handed out as an `Rc` and also kept in `Heap::objects`, which is the
//! reachability anchor the spec describes (see DESIGN.md).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::chunk::Chunk;
use crate::value::Value;

/// FNV-1a, matching the hash the spec mandates for string identity.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// An interned, immutable string.
#[derive(Debug)]
pub struct LoxString {
    pub hash: u32,
    pub chars: Box<str>,
}

impl LoxString {
    pub fn as_str(&self) -> &str {
        &self.chars
    }
}

pub type StringRef = Rc<LoxString>;

/// A compiled function: its own chunk plus arity/upvalue metadata. The
/// top-level script is a `LoxFunction` named `None` with arity 0.
#[derive(Debug)]
pub struct LoxFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub name: Option<StringRef>,
    pub chunk: Chunk,
}

pub type FunctionRef = Rc<LoxFunction>;

/// A host-provided native function.
pub type NativeFn = fn(&[Value]) -> Value;

pub struct NativeFunction {
    pub name: StringRef,
    pub function: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name.as_str()).finish()
    }
}

pub type NativeRef = Rc<NativeFunction>;

/// Either still aliasing a live stack slot, or closed over its own value.
///
/// The spec's `slot_ptr` is a raw pointer into the value stack; a `Vec`-backed
/// stack can reallocate and invalidate that, so open upvalues here hold a
/// stack *index* instead. Closing moves the value in and flips the variant —
/// the same "rebind the storage cell" contract, expressed safely.
#[derive(Debug)]
pub enum UpvalueState {
    Open(usize),
    Closed(Value),
}

#[derive(Debug)]
pub struct Upvalue {
    pub state: RefCell<UpvalueState>,
}

pub type UpvalueRef = Rc<Upvalue>;

/// A function plus the upvalues it captured at creation time.
#[derive(Debug)]
pub struct Closure {
    pub function: FunctionRef,
    pub upvalues: Vec<UpvalueRef>,
}

pub type ClosureRef = Rc<Closure>;

/// A reference to any heap object. Cheap to clone (refcount bump).
#[derive(Debug, Clone)]
pub enum Obj {
    Str(StringRef),
    Function(FunctionRef),
    Native(NativeRef),
    Closure(ClosureRef),
    Upvalue(UpvalueRef),
}

impl Obj {
    /// Reference identity. Strings are interned, so for `Obj::Str` this
    /// already coincides with value equality.
    pub fn ref_eq(&self, other: &Obj) -> bool {
        match (self, other) {
            (Obj::Str(a), Obj::Str(b)) => Rc::ptr_eq(a, b),
            (Obj::Function(a), Obj::Function(b)) => Rc::ptr_eq(a, b),
            (Obj::Native(a), Obj::Native(b)) => Rc::ptr_eq(a, b),
            (Obj::Closure(a), Obj::Closure(b)) => Rc::ptr_eq(a, b),
            (Obj::Upvalue(a), Obj::Upvalue(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_string(&self) -> Option<&StringRef> {
        match self {
            Obj::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::Str(s) => write!(f, "{}", s.as_str()),
            Obj::Function(fun) => match &fun.name {
                Some(name) => write!(f, "<fn {}>", name.as_str()),
                None => write!(f, "<script>"),
            },
            Obj::Native(_) => write!(f, "<native fn>"),
            Obj::Closure(c) => match &c.function.name {
                Some(name) => write!(f, "<fn {}>", name.as_str()),
                None => write!(f, "<script>"),
            },
            Obj::Upvalue(_) => write!(f, "<upvalue>"),
        }
    }
}

/// Owns every object ever allocated and interns strings by identity.
pub struct Heap {
    strings: AHashMap<Box<str>, StringRef>,
    objects: Vec<Obj>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self { strings: AHashMap::default(), objects: Vec::new() }
    }

    /// Interns `s`, returning the single canonical `StringRef` for it. At
    /// most one `LoxString` exists per distinct byte sequence.
    pub fn intern(&mut self, s: &str) -> StringRef {
        if let Some(existing) = self.strings.get(s) {
            return existing.clone();
        }
        let obj = Rc::new(LoxString { hash: fnv1a(s.as_bytes()), chars: s.into() });
        self.strings.insert(s.into(), obj.clone());
        self.objects.push(Obj::Str(obj.clone()));
        obj
    }

    pub fn alloc_function(&mut self, function: LoxFunction) -> FunctionRef {
        let r = Rc::new(function);
        self.objects.push(Obj::Function(r.clone()));
        r
    }

    pub fn alloc_native(&mut self, native: NativeFunction) -> NativeRef {
        let r = Rc::new(native);
        self.objects.push(Obj::Native(r.clone()));
        r
    }

    pub fn alloc_closure(&mut self, closure: Closure) -> ClosureRef {
        let r = Rc::new(closure);
        self.objects.push(Obj::Closure(r.clone()));
        r
    }

    pub fn alloc_upvalue(&mut self, state: UpvalueState) -> UpvalueRef {
        let r = Rc::new(Upvalue { state: RefCell::new(state) });
        self.objects.push(Obj::Upvalue(r.clone()));
        r
    }

    /// Number of objects ever allocated (interned strings counted once).
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_reference_identity() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn distinct_strings_are_distinct_objects() {
        let mut heap = Heap::new();
        let a = heap.intern("foo");
        let b = heap.intern("bar");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(heap.object_count(), 2);
    }
}
