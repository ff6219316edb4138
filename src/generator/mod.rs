// Generator module
// Sends assembled prompts to the language model, whole or streamed

pub mod gemini;
pub mod ollama;


use std::io::{BufRead, BufReader};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::config::{GeneratorConfig, Provider};
use crate::{RagError, Result};

pub use gemini::GeminiGenerator;
pub use ollama::OllamaGenerator;

/// Lazily produced answer fragments
///
/// Finite and not restartable. Dropping it stops the reader and closes the
/// underlying connection.
pub type TextStream = BoxStream<'static, Result<String>>;

// Fragments buffered between the reader thread and the consumer
const STREAM_BUFFER: usize = 16;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the complete answer for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Produce the answer as a stream of text fragments
    ///
    /// Errors establishing the request are returned directly; errors while
    /// reading arrive as stream items.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    /// Largest prompt accepted, in characters
    fn max_prompt_chars(&self) -> usize;

    fn model(&self) -> &str;
}

/// Reject prompts longer than `limit` characters before anything is sent
#[inline]
pub fn check_budget(prompt: &str, limit: usize) -> Result<()> {
    let required = prompt.chars().count();
    if required > limit {
        return Err(RagError::BudgetExceeded { required, limit });
    }
    Ok(())
}

/// What one line of a streamed response body contributes
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Text(String),
    Skip,
    Done,
}

pub(crate) fn into_generation_error(error: anyhow::Error) -> RagError {
    match error.downcast::<RagError>() {
        Ok(rag_error) => rag_error,
        Err(other) => RagError::Generation(format!("{:#}", other)),
    }
}

/// Turn a line-oriented response body into a [`TextStream`]
///
/// The body is read on a blocking thread. Each line goes through `parse`;
/// the stream ends at end of body, on [`StreamEvent::Done`], after the first
/// error, or as soon as the consumer drops the stream.
pub(crate) fn line_stream<R, F>(reader: R, mut parse: F) -> TextStream
where
    R: std::io::Read + Send + 'static,
    F: FnMut(&str) -> Result<StreamEvent> + Send + 'static,
{
    let (mut sender, receiver) = mpsc::channel::<Result<String>>(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || {
        let mut lines = BufReader::new(reader).lines();

        loop {
            let item = match lines.next() {
                None => break,
                Some(Err(e)) => Err(RagError::Generation(format!(
                    "Failed to read response stream: {}",
                    e
                ))),
                Some(Ok(line)) => match parse(&line) {
                    Ok(StreamEvent::Text(text)) => Ok(text),
                    Ok(StreamEvent::Skip) => continue,
                    Ok(StreamEvent::Done) => break,
                    Err(e) => Err(e),
                },
            };

            let failed = item.is_err();
            if futures::executor::block_on(sender.send(item)).is_err() {
                debug!("Stream consumer went away, closing response");
                break;
            }
            if failed {
                warn!("Response stream ended with an error");
                break;
            }
        }
    });

    receiver.boxed()
}

/// Build the generator selected in the configuration
#[inline]
pub fn build_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        Provider::Ollama => Arc::new(OllamaGenerator::new(config)?),
        Provider::Gemini => Arc::new(GeminiGenerator::new(config)?),
    };
    Ok(generator)
}
