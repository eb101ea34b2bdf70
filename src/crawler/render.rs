//! Render fallback for client-rendered pages
//!
//! Pages that extract as an SPA shell or with very low quality can be
//! re-fetched through a [`Renderer`] (typically a headless browser). The
//! rendered HTML goes through the same extractor and replaces the original
//! only when it is clearly better.

use crate::crawler::extract::FetchedPage;
use crate::url::origin_of;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use url::Url;

/// Upper bound on render attempts per crawl
pub const RENDER_BUDGET_CAP: usize = 25;

/// Pages scoring below this are render candidates
pub const RENDER_QUALITY_THRESHOLD: f64 = 0.18;

/// Markdown growth (chars) a render must exceed to be accepted
pub const RENDER_MIN_MARKDOWN_GAIN: usize = 20;

/// Quality growth a render must exceed to be accepted
pub const RENDER_MIN_QUALITY_GAIN: f64 = 0.02;

/// Default timeout for [`CommandRenderer`]
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Renderer returned no HTML")]
    Empty,
}

/// HTML produced by a renderer
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// URL the renderer ended up on
    pub final_url: Url,
}

/// Produces fully rendered HTML for a URL
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;

    /// Releases any resources held by the renderer
    async fn close(&self) {}
}

/// Renders by running an external command with the URL as its last argument
///
/// The command's stdout is taken as the rendered HTML, for example
/// `chromium --headless --dump-dom <url>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    /// Builds a renderer from `[program, args...]`, or `None` if empty
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(RenderError::Empty);
        }

        Ok(RenderedPage {
            html,
            final_url: url.clone(),
        })
    }
}

/// Number of render attempts allowed for a crawl
pub fn render_budget(max_pages: usize) -> usize {
    max_pages.min(RENDER_BUDGET_CAP)
}

/// Checks whether an extracted page should be retried through the renderer
pub fn needs_render(page: &FetchedPage) -> bool {
    !page.meta.noindex && (page.is_shell || page.quality < RENDER_QUALITY_THRESHOLD)
}

/// Decides whether a rendered extraction replaces the original
///
/// The render must stay on the canonical URL's origin, must not itself be a
/// shell, and must improve markdown length or quality by a clear margin.
pub fn accept_render(original: &FetchedPage, rendered: &FetchedPage, canonical: &Url, rendered_url: &Url) -> bool {
    if origin_of(rendered_url) != origin_of(canonical) || rendered.is_shell {
        return false;
    }

    let original_len = original.markdown.chars().count();
    let rendered_len = rendered.markdown.chars().count();

    rendered_len > original_len + RENDER_MIN_MARKDOWN_GAIN
        || rendered.quality > original.quality + RENDER_MIN_QUALITY_GAIN
}
