//! Single-line context transport between agent and plugin host

use crate::error::{PluginError, PluginResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Serialize a context as one JSON line, without the terminator
pub fn encode_context<T: Serialize>(context: &T) -> PluginResult<String> {
    Ok(serde_json::to_string(context)?)
}

pub fn decode_context<T: DeserializeOwned>(line: &str) -> PluginResult<T> {
    serde_json::from_str(line).map_err(|e| PluginError::InvalidContext(e.to_string()))
}

/// Read exactly one line; end-of-stream or a blank line means no context
pub async fn read_context_line<R>(reader: &mut R) -> PluginResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 || line.trim().is_empty() {
        return Err(PluginError::MissingContext);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandPluginExecutionContext;
    use tokio::io::BufReader;

    #[test]
    fn test_reads_only_the_first_line() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"Data\":\"x\"}\r\n{\"Data\":\"y\"}\n")
            .build();
        let mut reader = BufReader::new(mock);

        let line = tokio_test::block_on(read_context_line(&mut reader)).unwrap();
        assert_eq!(line, "{\"Data\":\"x\"}");
        let ctx: CommandPluginExecutionContext = decode_context(&line).unwrap();
        assert_eq!(ctx.data, "x");
    }

    #[test]
    fn test_empty_input_is_missing_context() {
        let mut reader = BufReader::new(tokio_test::io::Builder::new().build());
        let result = tokio_test::block_on(read_context_line(&mut reader));
        assert!(matches!(result, Err(PluginError::MissingContext)));

        let mut reader = BufReader::new(tokio_test::io::Builder::new().read(b"  \n").build());
        let result = tokio_test::block_on(read_context_line(&mut reader));
        assert!(matches!(result, Err(PluginError::MissingContext)));
    }

    #[test]
    fn test_malformed_json_is_invalid_context() {
        let result: PluginResult<CommandPluginExecutionContext> = decode_context("{not json");
        assert!(matches!(result, Err(PluginError::InvalidContext(_))));
    }

    #[test]
    fn test_encoded_context_is_single_line() {
        let ctx = CommandPluginExecutionContext {
            data: "multi\nline".into(),
            ..Default::default()
        };
        let line = encode_context(&ctx).unwrap();
        assert!(!line.contains('\n'));
        let back: CommandPluginExecutionContext = decode_context(&line).unwrap();
        assert_eq!(back, ctx);
    }
}
