//! `file` - read file contents through the I/O collaborator.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::Result;

use crate::external::call_with_retries;
use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct FileOp;

impl Operator for FileOp {
    fn name(&self) -> &str {
        "file"
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("file", args, 1)?;

        let path = ctx.resolve_text(&args[0])?;
        let contents = call_with_retries(ctx.retry(), "file", |_| ctx.files().load(&path))?;
        Ok(Response::Replace(Value::String(contents)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpContext, Registry};
    use weft_tree::Cursor;

    #[test]
    fn test_file_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("motd.txt"), "welcome\n").unwrap();

        let registry = Registry::with_defaults();
        let tree: Value = serde_yaml::from_str("path: motd.txt\n").unwrap();
        let env = crate::ProcessEnv;
        let files = crate::StdFileLoader::rooted(dir.path());
        let secrets = crate::StaticSecrets::empty();
        let ctx = OpContext::new(
            &tree,
            Cursor::root(),
            &registry,
            &env,
            &files,
            &secrets,
            crate::RetryPolicy::none(),
        );

        let expr = weft_par::parse_expression("file path", &registry).unwrap();
        assert_eq!(ctx.resolve(&expr).unwrap(), Value::from("welcome\n"));
    }

    #[test]
    fn test_file_missing_is_external_error() {
        let registry = Registry::with_defaults();
        let tree: Value = serde_yaml::from_str("path: nope.txt\n").unwrap();
        let ctx = OpContext::for_tests(&tree, &registry);

        let expr = weft_par::parse_expression("file path", &registry).unwrap();
        assert!(ctx.resolve(&expr).is_err());
    }
}
