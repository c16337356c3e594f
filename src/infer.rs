use std::fmt;

use rustc_hash::FxHashMap;

use crate::ast::Expr;

/// Coarse type tag used to pick a code shape, not a full static type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int,
    Float,
    Str,
    Void,
    /// Untyped placeholder, spelled `var` on the Java side.
    Unknown,
    Array(Box<Ty>),
}

impl Ty {
    pub fn from_name(name: &str) -> Ty {
        match name {
            "int" => Ty::Int,
            "float" => Ty::Float,
            "String" => Ty::Str,
            "void" => Ty::Void,
            _ => Ty::Unknown,
        }
    }

    pub fn array_of(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array(_))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Float => write!(f, "float"),
            Ty::Str => write!(f, "String"),
            Ty::Void => write!(f, "void"),
            Ty::Unknown => write!(f, "var"),
            Ty::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

/// Flat per-compilation name table: variable types and function result
/// types. Carried explicitly through the generator, never ambient.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    vars: FxHashMap<String, Ty>,
    funcs: FxHashMap<String, Ty>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a variable's type. First write wins: a name already in the
    /// table keeps the type inferred at its first assignment.
    pub fn bind(&mut self, name: &str, ty: Ty) {
        self.vars.entry(name.to_string()).or_insert(ty);
    }

    /// Records a function's result type, first write wins. The translation
    /// pipeline itself never calls this when compiling top-level statements;
    /// unregistered calls infer as the untyped placeholder.
    pub fn bind_func(&mut self, name: &str, ret: Ty) {
        self.funcs.entry(name.to_string()).or_insert(ret);
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Ty> {
        self.vars.get(name)
    }

    /// Array-typed variables, sorted by name so generated code is stable
    /// across runs.
    pub fn array_bindings(&self) -> Vec<(String, Ty)> {
        let mut out: Vec<(String, Ty)> = self
            .vars
            .iter()
            .filter(|(_, ty)| ty.is_array())
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Best-effort expression typing. Never fails; anything it cannot
    /// classify comes back as `Ty::Unknown`.
    pub fn infer(&self, expr: &Expr) -> Ty {
        match expr {
            Expr::Int(_) => Ty::Int,
            Expr::Float(_) => Ty::Float,
            Expr::Str(_) => Ty::Str,
            Expr::Var(name) => self.vars.get(name).cloned().unwrap_or(Ty::Unknown),
            Expr::Index { array, .. } => match self.vars.get(array) {
                Some(Ty::Array(elem)) => (**elem).clone(),
                Some(_) => Ty::Unknown,
                // Unrecorded arrays are assumed int[].
                None => Ty::Int,
            },
            Expr::Binary { left, right, .. } => {
                dominate(self.infer(left), self.infer(right))
            }
            Expr::Call { name, .. } => self.funcs.get(name).cloned().unwrap_or(Ty::Unknown),
            Expr::Select {
                if_true, if_false, ..
            } => dominate(self.infer(if_true), self.infer(if_false)),
            Expr::FString(_) => Ty::Str,
            Expr::SafeNav { .. } => Ty::Unknown,
        }
    }
}

/// Numeric domination order for mixed operands: string > float > int.
fn dominate(lhs: Ty, rhs: Ty) -> Ty {
    if lhs == Ty::Str || rhs == Ty::Str {
        Ty::Str
    } else if lhs == Ty::Float || rhs == Ty::Float {
        Ty::Float
    } else {
        Ty::Int
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FStringPart;

    fn binary(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op: "+".to_string(),
            right: Box::new(right),
        }
    }

    #[test]
    fn literals_map_directly() {
        let env = TypeEnv::new();
        assert_eq!(env.infer(&Expr::Int(1)), Ty::Int);
        assert_eq!(env.infer(&Expr::Float(1.5)), Ty::Float);
        assert_eq!(env.infer(&Expr::Str("hi".to_string())), Ty::Str);
    }

    #[test]
    fn string_dominates_binary_operands() {
        let env = TypeEnv::new();
        let expr = binary(Expr::Str("a".to_string()), Expr::Int(1));
        assert_eq!(env.infer(&expr), Ty::Str);
    }

    #[test]
    fn float_dominates_int() {
        let env = TypeEnv::new();
        let expr = binary(Expr::Float(1.0), Expr::Int(2));
        assert_eq!(env.infer(&expr), Ty::Float);
    }

    #[test]
    fn int_operands_stay_int() {
        let env = TypeEnv::new();
        let expr = binary(Expr::Int(1), Expr::Int(2));
        assert_eq!(env.infer(&expr), Ty::Int);
    }

    #[test]
    fn index_strips_one_array_layer() {
        let mut env = TypeEnv::new();
        env.bind("a", Ty::array_of(Ty::Float));
        let expr = Expr::Index {
            array: "a".to_string(),
            index: Box::new(Expr::Int(0)),
        };
        assert_eq!(env.infer(&expr), Ty::Float);
    }

    #[test]
    fn index_into_unrecorded_array_defaults_to_int() {
        let env = TypeEnv::new();
        let expr = Expr::Index {
            array: "mystery".to_string(),
            index: Box::new(Expr::Int(0)),
        };
        assert_eq!(env.infer(&expr), Ty::Int);
    }

    #[test]
    fn index_into_non_array_variable_is_unknown() {
        let mut env = TypeEnv::new();
        env.bind("n", Ty::Int);
        let expr = Expr::Index {
            array: "n".to_string(),
            index: Box::new(Expr::Int(0)),
        };
        assert_eq!(env.infer(&expr), Ty::Unknown);
    }

    #[test]
    fn call_uses_registered_result_type() {
        let mut env = TypeEnv::new();
        env.bind_func("area", Ty::Float);
        let registered = Expr::Call {
            name: "area".to_string(),
            args: vec![],
        };
        let unregistered = Expr::Call {
            name: "helper".to_string(),
            args: vec![],
        };
        assert_eq!(env.infer(&registered), Ty::Float);
        assert_eq!(env.infer(&unregistered), Ty::Unknown);
    }

    #[test]
    fn first_binding_wins() {
        let mut env = TypeEnv::new();
        env.bind("x", Ty::Int);
        env.bind("x", Ty::Float);
        assert_eq!(env.lookup("x"), Some(&Ty::Int));
    }

    #[test]
    fn select_joins_arms() {
        let env = TypeEnv::new();
        let expr = Expr::Select {
            cond: Box::new(Expr::Int(1)),
            if_true: Box::new(Expr::Float(1.0)),
            if_false: Box::new(Expr::Int(0)),
        };
        assert_eq!(env.infer(&expr), Ty::Float);
    }

    #[test]
    fn fstring_is_string_typed() {
        let env = TypeEnv::new();
        let expr = Expr::FString(vec![
            FStringPart::Text("x = ".to_string()),
            FStringPart::Expr(Expr::Int(1)),
        ]);
        assert_eq!(env.infer(&expr), Ty::Str);
    }

    #[test]
    fn array_bindings_are_sorted() {
        let mut env = TypeEnv::new();
        env.bind("b", Ty::array_of(Ty::Int));
        env.bind("n", Ty::Int);
        env.bind("a", Ty::array_of(Ty::Float));
        let names: Vec<String> = env
            .array_bindings()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
