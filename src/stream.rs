//! Streaming batch API: emit results as tasks finish.
//!
//! [`Converter::convert_batch`] waits for the whole batch and returns
//! results in submission order. [`Converter::convert_stream`] yields each
//! `(index, result)` pair as soon as its task completes, so callers can
//! report progress or act on early artifacts. Pairs arrive in completion
//! order; sort by `index` if submission order matters.

use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_stream::Stream;

use crate::convert::Converter;
use crate::task::{ConversionResult, ConversionTask};

/// A boxed stream of `(submission index, result)` pairs.
pub type ResultStream = Pin<Box<dyn Stream<Item = (usize, ConversionResult)> + Send>>;

impl Converter {
    /// Convert `tasks` with at most `concurrency` in flight (0 is treated
    /// as 1), yielding results in completion order.
    ///
    /// Every task yields exactly one item, failures and panics included.
    /// Batch-level progress events are not emitted; per-task ones are.
    pub fn convert_stream(&self, tasks: Vec<ConversionTask>, concurrency: usize) -> ResultStream {
        let total = tasks.len();
        let limit = concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let this = self.clone();

        let s = stream::iter(tasks.into_iter().enumerate().map(move |(index, task)| {
            let handle = this.spawn_task(index, total, task.clone(), Arc::clone(&semaphore));
            let this = this.clone();
            async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => this.join_failure(index, total, task, e),
                };
                (index, result)
            }
        }))
        .buffer_unordered(limit);

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::error::RenderError;
    use crate::pipeline::render::{RenderOptions, Renderer};
    use crate::theme::ThemeRegistry;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    /// Sleeps longer for earlier tasks so completion order is reversed.
    struct SlowFirstRenderer;

    #[async_trait]
    impl Renderer for SlowFirstRenderer {
        async fn render(
            &self,
            _html: &str,
            output: &Path,
            _options: &RenderOptions,
        ) -> Result<(), RenderError> {
            let name = output.file_stem().and_then(|s| s.to_str()).unwrap_or("0");
            let n: u64 = name.trim_start_matches("doc").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(200 - n * 60)).await;
            tokio::fs::write(output, b"%PDF-1.4").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stream_yields_every_task_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = Vec::new();
        for i in 0..3 {
            let src = dir.path().join(format!("doc{i}.md"));
            std::fs::write(&src, format!("# Doc {i}\n")).unwrap();
            tasks.push(ConversionTask::new(&src, src.with_extension("pdf"), "github"));
        }
        tasks.push(ConversionTask::new(dir.path().join("missing.md"), "x.pdf", "github"));

        let c = Converter::new(
            ConverterConfig::default(),
            ThemeRegistry::with_builtins(),
            Arc::new(SlowFirstRenderer),
        );
        let mut items: Vec<(usize, ConversionResult)> = c.convert_stream(tasks, 4).collect().await;

        // The validation failure finishes first; doc2 beats doc0.
        assert_eq!(items[0].0, 3);
        assert!(!items[0].1.success);
        let pos = |i: usize| items.iter().position(|(idx, _)| *idx == i).unwrap();
        assert!(pos(2) < pos(0));

        items.sort_by_key(|(i, _)| *i);
        let indices: Vec<usize> = items.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(items[..3].iter().all(|(_, r)| r.success));
    }
}
