use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use jppc::codegen::JavaGen;
use jppc::{lexer, parser, toolchain};

fn main() -> Result<()> {
    let mut run_flag = false;
    let mut source_path: Option<PathBuf> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--run" => run_flag = true,
            _ if arg.starts_with('-') => bail!("Unknown flag '{arg}'"),
            _ => {
                if source_path.is_some() {
                    bail!("Only one input file is supported");
                }
                source_path = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(source_path) = source_path else {
        eprintln!("Usage: jppc <file.jpp> [--run]");
        return Ok(());
    };

    let source = fs::read_to_string(&source_path)
        .with_context(|| format!("Reading {}", source_path.display()))?;

    let tokens = lexer::tokenize(&source).context("Lexer error")?;
    let program = parser::parse_tokens(tokens).context("Parser error")?;

    let mut gen = JavaGen::new(&source_path.to_string_lossy());
    gen.gen_program(&program).context("Code generation error")?;

    let java_path = source_path.with_extension("java");
    fs::write(&java_path, gen.output())
        .with_context(|| format!("Writing {}", java_path.display()))?;
    println!("Wrote {}", java_path.display());

    if run_flag {
        toolchain::compile_java(&java_path)?;
        toolchain::run_class(&java_path, gen.class_name())?;
    }

    Ok(())
}
