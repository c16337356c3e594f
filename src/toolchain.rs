use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Compiles a generated Java file with `javac`, leaving the class file next
/// to it. A missing executable is reported differently from a compiler
/// diagnostic.
pub fn compile_java(java_path: &Path) -> Result<()> {
    let output = match Command::new("javac").arg(java_path).output() {
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            bail!("javac not found. Install a JDK and add it to PATH.")
        }
        other => other.context("Running javac")?,
    };
    if !output.status.success() {
        bail!(
            "Java compilation failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Runs the compiled class with `java`, inheriting stdio so the translated
/// program talks straight to the terminal.
pub fn run_class(java_path: &Path, class_name: &str) -> Result<()> {
    let class_dir = match java_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let status = match Command::new("java")
        .arg("-cp")
        .arg(class_dir)
        .arg(class_name)
        .status()
    {
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            bail!("java not found. Install a JDK and add it to PATH.")
        }
        other => other.context("Running java")?,
    };
    if !status.success() {
        bail!("Java program exited with {status}");
    }
    Ok(())
}
