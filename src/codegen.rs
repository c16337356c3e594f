use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::ast::{AssignTarget, Expr, FStringPart, Program, Stmt};
use crate::infer::{Ty, TypeEnv};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Unsupported node: {node}")]
    Unsupported { node: &'static str },
}

/// Emits one Java translation unit from a parsed program. Holds the
/// per-compilation type environment; nothing survives across runs.
pub struct JavaGen {
    lines: Vec<String>,
    indent: usize,
    pub types: TypeEnv,
    imports: BTreeSet<&'static str>,
    class_name: String,
}

impl JavaGen {
    pub fn new(source_name: &str) -> Self {
        Self {
            lines: Vec::new(),
            indent: 2,
            types: TypeEnv::new(),
            imports: BTreeSet::new(),
            class_name: class_name_from(source_name),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn gen_program(&mut self, program: &Program) -> Result<(), CodegenError> {
        for stmt in &program.stmts {
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Assign { target, value } => match target {
                // An indexed store is never a declaration.
                AssignTarget::Element { array, index } => {
                    let val = self.scalar_expr(value)?;
                    let idx = self.scalar_expr(index)?;
                    self.emit(&format!("{array}[{idx}] = {val};"));
                }
                AssignTarget::Name(name) => {
                    let val = self.scalar_expr(value)?;
                    let ty = self.types.infer(value);
                    if !self.types.is_bound(name) {
                        self.emit(&format!("{ty} {name} = {val};"));
                        self.types.bind(name, ty);
                    } else {
                        self.emit(&format!("{name} = {val};"));
                    }
                }
            },
            Stmt::If { cond, body, orelse } => {
                let cond = self.scalar_expr(cond)?;
                self.emit(&format!("if({cond}){{"));
                self.indent += 1;
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                self.indent -= 1;
                self.emit("}");
                if let Some(orelse) = orelse {
                    self.emit("else{");
                    self.indent += 1;
                    for stmt in orelse {
                        self.gen_stmt(stmt)?;
                    }
                    self.indent -= 1;
                    self.emit("}");
                }
            }
            Stmt::While { cond, body } => {
                let cond = self.scalar_expr(cond)?;
                self.emit(&format!("while({cond}){{"));
                self.indent += 1;
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                self.indent -= 1;
                self.emit("}");
            }
            Stmt::For {
                var, start, end, body,
            } => self.gen_for(var, start, end, body)?,
            Stmt::Expr(expr) => {
                let text = self.scalar_expr(expr)?;
                self.emit(&format!("{text};"));
            }
            Stmt::Return(expr) => {
                let val = match expr {
                    Some(expr) => self.scalar_expr(expr)?,
                    None => String::new(),
                };
                self.emit(&format!("return {val};"));
            }
            // Top-level generation has no emission rule for function
            // definitions; calls to them stay untyped.
            Stmt::Func(_) => {}
            Stmt::Class(_) => {
                return Err(CodegenError::Unsupported {
                    node: "class definition",
                });
            }
        }
        Ok(())
    }

    /// Counted loops either vectorize over the known arrays or fall back to
    /// a scalar counting loop when no array is in scope.
    fn gen_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
    ) -> Result<(), CodegenError> {
        let bindings = self.types.array_bindings();

        if bindings.is_empty() {
            let start = self.scalar_expr(start)?;
            let end = self.scalar_expr(end)?;
            self.emit(&format!("for(int {var}={start};{var}<{end};{var}++){{"));
            self.indent += 1;
            for stmt in body {
                self.gen_stmt(stmt)?;
            }
            self.indent -= 1;
            self.emit("}");
            return Ok(());
        }

        let float_lane = bindings
            .iter()
            .any(|(_, ty)| matches!(ty, Ty::Array(elem) if **elem == Ty::Float));
        let vec_class = if float_lane { "FloatVector" } else { "IntVector" };
        let arrays: BTreeSet<String> = bindings.into_iter().map(|(name, _)| name).collect();

        self.imports.insert("jdk.incubator.vector.*");

        let end = self.scalar_expr(end)?;

        self.emit(&format!("var species = {vec_class}.SPECIES_PREFERRED;"));
        self.emit(&format!("int bound = species.loopBound({end});"));

        // Main loop: whole lane-width blocks. Only indexed-array stores are
        // rewritten here; every other body statement runs in the tail loop
        // alone.
        self.emit("for(int i=0;i<bound;i+=species.length()){");
        self.indent += 1;
        for array in &arrays {
            self.emit(&format!("var v_{array} = {vec_class}.fromArray(species,{array},i);"));
        }
        for stmt in body {
            if let Stmt::Assign {
                target: AssignTarget::Element { array, .. },
                value,
            } = stmt
            {
                let val = self.gen_expr(value, true, &arrays)?;
                self.emit(&format!("v_{array} = {val};"));
            }
        }
        for array in &arrays {
            self.emit(&format!("v_{array}.intoArray({array},i);"));
        }
        self.indent -= 1;
        self.emit("}");

        // Tail loop: the remaining < lane-width elements, fully scalar.
        self.emit(&format!("for(int i=bound;i<{end};i++){{"));
        self.indent += 1;
        for stmt in body {
            self.gen_stmt(stmt)?;
        }
        self.indent -= 1;
        self.emit("}");
        Ok(())
    }

    fn gen_expr(
        &self,
        expr: &Expr,
        vector: bool,
        arrays: &BTreeSet<String>,
    ) -> Result<String, CodegenError> {
        match expr {
            Expr::Int(value) => Ok(value.to_string()),
            Expr::Float(value) => Ok(format!("{value:?}f")),
            Expr::Str(value) => Ok(format!("\"{value}\"")),
            Expr::Var(name) => {
                if vector && arrays.contains(name) {
                    Ok(format!("v_{name}"))
                } else {
                    Ok(name.clone())
                }
            }
            Expr::Index { array, index } => {
                let idx = self.gen_expr(index, vector, arrays)?;
                Ok(format!("{array}[{idx}]"))
            }
            Expr::Call { name, args } => {
                let name = if name == "print" {
                    "System.out.println"
                } else {
                    name.as_str()
                };
                let args = args
                    .iter()
                    .map(|arg| self.gen_expr(arg, vector, arrays))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{name}({})", args.join(",")))
            }
            Expr::Binary { left, op, right } => {
                let l = self.gen_expr(left, vector, arrays)?;
                let r = self.gen_expr(right, vector, arrays)?;

                if vector {
                    match op.as_str() {
                        "+" => return Ok(format!("{l}.add({r})")),
                        "-" => return Ok(format!("{l}.sub({r})")),
                        "*" => return Ok(format!("{l}.mul({r})")),
                        "/" => return Ok(format!("{l}.div({r})")),
                        _ => {}
                    }
                }

                // Reference equality is useless on Java strings.
                if op == "==" && self.types.infer(left) == Ty::Str {
                    return Ok(format!("{l}.equals({r})"));
                }

                Ok(format!("({l} {op} {r})"))
            }
            Expr::Select {
                cond,
                if_true,
                if_false,
            } => {
                let c = self.gen_expr(cond, vector, arrays)?;
                let t = self.gen_expr(if_true, vector, arrays)?;
                let f = self.gen_expr(if_false, vector, arrays)?;
                Ok(format!("({c}?{t}:{f})"))
            }
            Expr::SafeNav { object, field } => {
                let obj = self.scalar_expr(object)?;
                Ok(format!("({obj}!=null?{obj}.{field}:null)"))
            }
            Expr::FString(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| match part {
                        FStringPart::Text(text) => Ok(format!("\"{text}\"")),
                        FStringPart::Expr(expr) => self.scalar_expr(expr),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(" + "))
            }
        }
    }

    fn scalar_expr(&self, expr: &Expr) -> Result<String, CodegenError> {
        self.gen_expr(expr, false, &BTreeSet::new())
    }

    fn emit(&mut self, line: &str) {
        self.lines.push(format!("{}{line}", "    ".repeat(self.indent)));
    }

    /// Assembles the translation unit: imports (only when vectorization
    /// was used), the public class, and a main method wrapping the
    /// generated statement lines.
    pub fn output(&self) -> String {
        let mut out = Vec::new();

        for import in &self.imports {
            out.push(format!("import {import};"));
        }
        if !self.imports.is_empty() {
            out.push(String::new());
        }

        out.push(format!("public class {} {{", self.class_name));
        out.push("    public static void main(String[] args) {".to_string());
        out.extend(self.lines.iter().cloned());
        out.push("    }".to_string());
        out.push("}".to_string());

        out.join("\n")
    }
}

impl Default for JavaGen {
    fn default() -> Self {
        Self::new("Main")
    }
}

/// File stem, first character upper-cased and the rest lowered, which is
/// what the generated class is named after.
fn class_name_from(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => "Main".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDef, FuncDef};
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;

    fn parse(input: &str) -> Program {
        parse_tokens(tokenize(input).expect("tokenize failed")).expect("parse failed")
    }

    fn generate(input: &str) -> String {
        let mut gen = JavaGen::new("demo.jpp");
        gen.gen_program(&parse(input)).expect("codegen failed");
        gen.output()
    }

    #[test]
    fn class_name_is_capitalized_stem() {
        assert_eq!(JavaGen::new("myProg.jpp").class_name(), "Myprog");
        assert_eq!(JavaGen::new("dir/demo.jpp").class_name(), "Demo");
    }

    #[test]
    fn first_assignment_declares_then_reassigns() {
        let output = generate("x = 1\nx = 2\n");
        assert!(output.contains("int x = 1;"));
        assert!(output.contains("        x = 2;"));
    }

    #[test]
    fn float_literal_carries_suffix() {
        let output = generate("y = 2.5\n");
        assert!(output.contains("float y = 2.5f;"));
    }

    #[test]
    fn whole_floats_keep_their_decimal_point() {
        let output = generate("y = 2.0\n");
        assert!(output.contains("float y = 2.0f;"));
    }

    #[test]
    fn indexed_store_is_never_a_declaration() {
        let output = generate("a[0] = 5\n");
        assert!(output.contains("a[0] = 5;"));
        assert!(!output.contains("int a[0]"));
    }

    #[test]
    fn print_rewrites_to_console_output() {
        let output = generate("print(42)\n");
        assert!(output.contains("System.out.println(42);"));
    }

    #[test]
    fn string_equality_uses_equals() {
        let output = generate(indoc! {r#"
            s = "hi"
            if s == "hi":
                print(s)
        "#});
        assert!(output.contains("String s = \"hi\";"));
        assert!(output.contains("if(s.equals(\"hi\")){"));
        assert!(!output.contains("(s == \"hi\")"));
    }

    #[test]
    fn numeric_equality_stays_infix() {
        let output = generate("n = 1\nif n == 1:\n    print(n)\n");
        assert!(output.contains("if((n == 1)){"));
    }

    #[test]
    fn else_branch_is_a_following_block() {
        let output = generate(indoc! {"
            x = 1
            if x == 1:
                x = 2
            else:
                x = 3
        "});
        let if_pos = output.find("if((x == 1)){").expect("if line");
        let else_pos = output.find("else{").expect("else line");
        assert!(if_pos < else_pos);
        assert!(output.contains("            x = 3;"));
    }

    #[test]
    fn while_emits_condition_checked_loop() {
        let output = generate(indoc! {"
            x = 0
            while x < 3:
                x = x + 1
        "});
        assert!(output.contains("while((x < 3)){"));
        assert!(output.contains("            x = (x + 1);"));
    }

    #[test]
    fn bare_return_keeps_statement_shape() {
        let mut gen = JavaGen::new("demo.jpp");
        gen.gen_stmt(&Stmt::Return(None)).expect("codegen failed");
        assert!(gen.output().contains("return ;"));
    }

    #[test]
    fn select_renders_as_conditional_expression() {
        let mut gen = JavaGen::new("demo.jpp");
        let stmt = Stmt::Assign {
            target: AssignTarget::Name("x".to_string()),
            value: Expr::Select {
                cond: Box::new(Expr::Var("c".to_string())),
                if_true: Box::new(Expr::Int(1)),
                if_false: Box::new(Expr::Int(2)),
            },
        };
        gen.gen_stmt(&stmt).expect("codegen failed");
        assert!(gen.output().contains("int x = (c?1:2);"));
    }

    #[test]
    fn safe_navigation_guards_against_null() {
        let output = generate("x = user ?. name\n");
        assert!(output.contains("var x = (user!=null?user.name:null);"));
    }

    #[test]
    fn fstring_concatenates_parts() {
        let mut gen = JavaGen::new("demo.jpp");
        let stmt = Stmt::Assign {
            target: AssignTarget::Name("msg".to_string()),
            value: Expr::FString(vec![
                FStringPart::Text("x = ".to_string()),
                FStringPart::Expr(Expr::Var("x".to_string())),
            ]),
        };
        gen.gen_stmt(&stmt).expect("codegen failed");
        assert!(gen.output().contains("String msg = \"x = \" + x;"));
    }

    #[test]
    fn function_definitions_vanish_from_output() {
        let output = generate(indoc! {"
            def add(x: int, y: int): int:
                return x + y
        "});
        assert!(!output.contains("add"));
    }

    #[test]
    fn calls_to_unregistered_functions_declare_var() {
        let mut gen = JavaGen::new("demo.jpp");
        let stmt = Stmt::Assign {
            target: AssignTarget::Name("r".to_string()),
            value: Expr::Call {
                name: "helper".to_string(),
                args: vec![],
            },
        };
        gen.gen_stmt(&stmt).expect("codegen failed");
        assert!(gen.output().contains("var r = helper();"));
    }

    #[test]
    fn class_definitions_are_unsupported() {
        let mut gen = JavaGen::new("demo.jpp");
        let stmt = Stmt::Class(ClassDef {
            name: "Point".to_string(),
            fields: vec!["x".to_string()],
            methods: Vec::<FuncDef>::new(),
            implements: None,
        });
        assert_eq!(
            gen.gen_stmt(&stmt),
            Err(CodegenError::Unsupported {
                node: "class definition",
            })
        );
    }

    #[test]
    fn scalar_loop_when_no_arrays_are_known() {
        let output = generate(indoc! {"
            for i : range(0, 3):
                print(i)
        "});
        assert!(output.contains("for(int i=0;i<3;i++){"));
        assert!(output.contains("System.out.println(i);"));
        assert!(!output.contains("import"));
        assert!(!output.contains("species"));
    }

    #[test]
    fn known_array_vectorizes_the_loop() {
        let mut gen = JavaGen::new("demo.jpp");
        gen.types.bind("a", Ty::array_of(Ty::Float));
        gen.gen_program(&parse(indoc! {"
            for i : range(0, n):
                a[i] = a[i] + a[i]
        "}))
        .expect("codegen failed");
        let output = gen.output();

        assert!(output.starts_with("import jdk.incubator.vector.*;\n"));
        assert!(output.contains("var species = FloatVector.SPECIES_PREFERRED;"));
        assert!(output.contains("int bound = species.loopBound(n);"));
        assert!(output.contains("for(int i=0;i<bound;i+=species.length()){"));
        assert!(output.contains("var v_a = FloatVector.fromArray(species,a,i);"));
        assert!(output.contains("v_a = a[i].add(a[i]);"));
        assert!(output.contains("v_a.intoArray(a,i);"));
        // Tail loop covers the remainder with native arithmetic.
        assert!(output.contains("for(int i=bound;i<n;i++){"));
        assert!(output.contains("a[i] = (a[i] + a[i]);"));
    }

    #[test]
    fn int_arrays_pick_the_int_lane() {
        let mut gen = JavaGen::new("demo.jpp");
        gen.types.bind("b", Ty::array_of(Ty::Int));
        gen.gen_program(&parse("for i : range(0, 8):\n    b[i] = b[i] * 2\n"))
            .expect("codegen failed");
        let output = gen.output();
        assert!(output.contains("var species = IntVector.SPECIES_PREFERRED;"));
        assert!(output.contains("v_b = b[i].mul(2);"));
    }

    #[test]
    fn non_store_statements_run_only_in_the_tail_loop() {
        let mut gen = JavaGen::new("demo.jpp");
        gen.types.bind("a", Ty::array_of(Ty::Float));
        gen.gen_program(&parse(indoc! {"
            for i : range(0, n):
                a[i] = a[i] + a[i]
                print(i)
        "}))
        .expect("codegen failed");
        let output = gen.output();

        let tail_pos = output.find("for(int i=bound;").expect("tail loop");
        let print_pos = output.find("System.out.println(i);").expect("print call");
        assert!(print_pos > tail_pos, "print must only appear in the tail loop");
        assert_eq!(output.matches("System.out.println(i);").count(), 1);
    }

    #[test]
    fn generation_is_idempotent_across_fresh_environments() {
        let program = parse(indoc! {"
            x = 1
            for i : range(0, 4):
                x = x + i
            print(x)
        "});
        let mut first = JavaGen::new("demo.jpp");
        first.gen_program(&program).expect("codegen failed");
        let mut second = JavaGen::new("demo.jpp");
        second.gen_program(&program).expect("codegen failed");
        assert_eq!(first.output(), second.output());
    }

    #[test]
    fn vectorized_output_is_idempotent_too() {
        let program = parse("for i : range(0, n):\n    a[i] = a[i] + 1\n");
        let outputs: Vec<String> = (0..2)
            .map(|_| {
                let mut gen = JavaGen::new("demo.jpp");
                gen.types.bind("b", Ty::array_of(Ty::Int));
                gen.types.bind("a", Ty::array_of(Ty::Int));
                gen.gen_program(&program).expect("codegen failed");
                gen.output()
            })
            .collect();
        assert_eq!(outputs[0], outputs[1]);
    }
}
