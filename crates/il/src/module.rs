//! Modules: the top-level compilation unit.

use crate::func::Function;
use crate::types::Type;
use std::fmt;

/// External function declaration resolved by the VM's runtime registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Extern {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Type>,
}

impl Extern {
    pub fn new(name: impl Into<String>, ret_type: Type, params: Vec<Type>) -> Self {
        Extern {
            name: name.into(),
            ret_type,
            params,
        }
    }
}

impl fmt::Display for Extern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extern @{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret_type)
    }
}

/// Global constant. String globals carry their initializer bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub init: Vec<u8>,
}

impl Global {
    pub fn new(name: impl Into<String>, ty: Type, init: Vec<u8>) -> Self {
        Global {
            name: name.into(),
            ty,
            init,
        }
    }
}

/// IL module aggregating externs, globals, and functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub externs: Vec<Extern>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_extern(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| e.name == name)
    }

    pub fn find_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let mut m = Module::new();
        m.externs.push(Extern::new("rt_print_i64", Type::Void, vec![Type::I64]));
        m.globals.push(Global::new("msg", Type::Str, b"hi".to_vec()));
        m.functions.push(Function::new("main", Type::I64, vec![]));
        assert!(m.find_extern("rt_print_i64").is_some());
        assert!(m.find_global("msg").is_some());
        assert_eq!(m.function_index("main"), Some(0));
        assert!(m.find_function("missing").is_none());
    }

    #[test]
    fn test_extern_display() {
        let e = Extern::new("rt_concat", Type::Str, vec![Type::Str, Type::Str]);
        assert_eq!(e.to_string(), "extern @rt_concat(str, str) -> str");
    }
}
