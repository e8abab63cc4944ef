use std::sync::Arc;

use anyhow::{Result, anyhow};
use swc_common::{FileName, Globals, SourceMap};
use swc_ecma_ast::Module;
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax};

pub struct ParsedSource {
    pub module: Module,
    pub source_map: Arc<SourceMap>,
}

/// Parse a JS/TS/JSX/TSX source string into an AST.
///
/// Accepts a shared SourceMap for thread-safe parallel parsing; each caller
/// thread creates its own map.
pub fn parse_source(
    code: String,
    file_path: &str,
    source_map: Arc<SourceMap>,
) -> Result<ParsedSource> {
    use swc_common::GLOBALS;

    // Wrap in GLOBALS.set() for thread safety
    GLOBALS.set(&Globals::new(), || {
        let source_file = source_map.new_source_file(FileName::Real(file_path.into()).into(), code);

        let syntax = Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        });

        let mut parser = Parser::new(syntax, StringInput::from(&*source_file), None);

        let module = parser
            .parse_module()
            .map_err(|e| anyhow!("Failed to parse source: {:?}", e))?;

        Ok(ParsedSource { module, source_map })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> Result<ParsedSource> {
        let source_map = Arc::new(SourceMap::default());
        parse_source(code.to_string(), "test.tsx", source_map)
    }

    #[test]
    fn test_parse_ts_module() {
        let parsed = parse("const QUERY = gql`query { id }`;").unwrap();
        assert_eq!(parsed.module.body.len(), 1);
    }

    #[test]
    fn test_parse_tsx_module() {
        assert!(parse("export const App = () => <div>{x}</div>;").is_ok());
    }

    #[test]
    fn test_parse_error() {
        assert!(parse("const s = \"unterminated").is_err());
    }
}
