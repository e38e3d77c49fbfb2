//! Rendering with a reusable output buffer.
//!
//! # Responsibilities
//! - Render a `TemplateContext` with the currently active template
//! - Reuse one output buffer across renders, keeping any growth
//! - Tolerate the benign "no child processes" race, fail on everything else

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::template::compiled::CompiledTemplate;
use crate::template::context::TemplateContext;
use crate::template::error::RenderError;

/// Initial capacity of the output buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 65535;

/// Message of the benign race between the edge process's signal handling and
/// a wait on an already-reaped child.
const ERR_NO_CHILD: &str = "no child processes";

/// Shared handle to the active template.
///
/// The whole template is replaced by reference; readers keep the `Arc` they
/// loaded for as long as their render runs.
#[derive(Debug, Clone)]
pub struct TemplateSlot {
    inner: Arc<ArcSwap<CompiledTemplate>>,
}

impl TemplateSlot {
    pub fn new(template: CompiledTemplate) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(template)),
        }
    }

    /// Snapshot of the active template.
    pub fn load(&self) -> Arc<CompiledTemplate> {
        self.inner.load_full()
    }

    /// Replace the active template.
    pub fn store(&self, template: CompiledTemplate) {
        self.inner.store(Arc::new(template));
    }
}

/// Renders artifacts with the template held in a [`TemplateSlot`].
#[derive(Debug)]
pub struct TemplateRenderer {
    slot: TemplateSlot,
    buffer: Vec<u8>,
    size: usize,
}

impl TemplateRenderer {
    pub fn new(slot: TemplateSlot) -> Self {
        Self {
            slot,
            buffer: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
            size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn slot(&self) -> &TemplateSlot {
        &self.slot
    }

    /// Capacity currently retained by the output buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Render `ctx` with the active template.
    pub fn render(&mut self, ctx: &TemplateContext<'_>) -> Result<Vec<u8>, RenderError> {
        let started = Instant::now();
        let template = self.slot.load();

        self.buffer.clear();
        let result = template.render_into(ctx, &mut self.buffer);

        if self.size < self.buffer.capacity() {
            tracing::info!(
                from = self.size,
                to = self.buffer.capacity(),
                "Adjusting template buffer size"
            );
            self.size = self.buffer.capacity();
        }

        match result {
            Ok(()) => {
                metrics::record_render(true, started);
                Ok(self.buffer.clone())
            }
            Err(e) if is_benign(&e) => {
                tracing::warn!(error = %e, "Ignoring benign render error");
                metrics::record_render(true, started);
                Ok(self.buffer.clone())
            }
            Err(source) => {
                metrics::record_render(false, started);
                Err(RenderError {
                    name: template.name().to_string(),
                    source,
                })
            }
        }
    }
}

fn is_benign(err: &minijinja::Error) -> bool {
    err.to_string().contains(ERR_NO_CHILD)
}
