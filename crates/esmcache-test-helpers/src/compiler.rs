//! Line-based stand-in for the real source transformer.
//!
//! Recognised lines:
//!
//! - `import ... from 'x'` / `import 'x'`: module specifier
//! - `export * from 'x'`: export star and module specifier
//! - `export default ...`: the `default` export
//! - `export const|let|var|function|class NAME ...`: a named export
//!
//! Any of these makes the source ESM and the output `changed`. A line that
//! mentions `arguments` produces a warning. Unbalanced braces are a syntax
//! error.

use esmcache_core::{CompileOptions, Compiler, CompilerOutput, Warning};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError: {message}")]
pub struct ToyCompileError {
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ToyCompiler {
    /// Number of `compile` calls so far
    pub calls: usize,
    /// Options of every call, in order
    pub seen: Vec<CompileOptions>,
}

impl ToyCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Compiler for ToyCompiler {
    type Error = ToyCompileError;

    fn compile(
        &mut self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompilerOutput, ToyCompileError> {
        self.calls += 1;
        self.seen.push(options.clone());

        let opens = source.matches('{').count();
        let closes = source.matches('}').count();
        if opens != closes {
            return Err(ToyCompileError {
                message: format!("Unbalanced braces ({opens} open, {closes} close)"),
            });
        }

        let mut output = CompilerOutput::default();
        let mut code = Vec::new();

        for (number, raw) in source.lines().enumerate() {
            let line = raw.trim();

            if let Some(rest) = line.strip_prefix("export * from ") {
                let specifier = unquote(rest);
                output.export_stars.push(specifier.clone());
                push_unique(&mut output.module_specifiers, specifier);
                output.esm = true;
                continue;
            }

            if let Some(rest) = line.strip_prefix("export default ") {
                output.export_names.push("default".to_string());
                output.esm = true;
                code.push(format!("{}.default({rest})", options.runtime_tag));
                continue;
            }

            if let Some(rest) = line.strip_prefix("export ") {
                if let Some(name) = declared_name(rest) {
                    output.export_names.push(name);
                }
                output.esm = true;
                code.push(rest.to_string());
                continue;
            }

            if let Some(rest) = line.strip_prefix("import ") {
                let specifier = match rest.rfind(" from ") {
                    Some(at) => unquote(&rest[at + " from ".len()..]),
                    None => unquote(rest),
                };
                push_unique(&mut output.module_specifiers, specifier);
                output.esm = true;
                continue;
            }

            if line.contains("arguments") {
                output.warnings.push(Warning::new(
                    "arguments-access",
                    format!("line {}: `arguments` is not available in modules", number + 1),
                ));
            }
            code.push(raw.to_string());
        }

        output.changed = output.esm;
        output.code = if output.esm {
            code.join("\n")
        } else {
            source.to_string()
        };
        Ok(output)
    }
}

fn unquote(text: &str) -> String {
    text.trim()
        .trim_end_matches(';')
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

fn declared_name(declaration: &str) -> Option<String> {
    let mut words = declaration.split_whitespace();
    match words.next()? {
        "const" | "let" | "var" | "function" | "class" => words
            .next()
            .map(|name| {
                name.trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                    .split(|c: char| c == '(' || c == '=')
                    .next()
                    .unwrap_or(name)
                    .to_string()
            })
            .filter(|name| !name.is_empty()),
        _ => None,
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esmcache_core::SourceType;

    fn options() -> CompileOptions {
        CompileOptions {
            cjs: false,
            hint: None,
            runtime_tag: "_rt".to_string(),
            source_type: SourceType::Module,
            var: false,
        }
    }

    #[test]
    fn test_esm_metadata() {
        let source = "import { a } from './a.js'\nexport * from './b.js'\nexport const x = 1\nexport function f() {}\nexport default x";
        let output = ToyCompiler::new().compile(source, &options()).unwrap();

        assert!(output.esm);
        assert!(output.changed);
        assert_eq!(output.export_names, vec!["x", "f", "default"]);
        assert_eq!(output.export_stars, vec!["./b.js"]);
        assert_eq!(output.module_specifiers, vec!["./a.js", "./b.js"]);
        assert!(output.code.contains("_rt.default(x)"));
    }

    #[test]
    fn test_cjs_passthrough() {
        let source = "module.exports = function () { return arguments.length }";
        let output = ToyCompiler::new().compile(source, &options()).unwrap();

        assert!(!output.esm);
        assert!(!output.changed);
        assert_eq!(output.code, source);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_syntax_error() {
        let err = ToyCompiler::new().compile("function f() {", &options()).unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError"));
    }
}
