//! Template-driven output files.
//!
//! Each [`OutputSink`] owns one destination file. A transition is fanned out
//! by [`SinkSet::dispatch`], which queues one job per sink keyed by its path:
//! writes to the same file are serialized, a failing sink never affects its
//! siblings.

mod template;

pub use template::Template;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::config::{GeneralConfig, SinkConfig, canonical_path};
use crate::error::{Error, Result, SinkError};
use crate::schedule::WorkerPool;
use crate::track::Track;

pub struct OutputSink {
    path: PathBuf,
    template: RwLock<Template>,
    placeholder: Template,
    append: bool,
    write_lock: Mutex<()>,
}

impl OutputSink {
    pub fn new(path: impl Into<PathBuf>, template: &str, placeholder: &str, append: bool) -> Self {
        Self {
            path: path.into(),
            template: RwLock::new(Template::new(template)),
            placeholder: Template::new(placeholder),
            append,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &SinkConfig, placeholder: &str) -> Self {
        Self::new(&config.file, &config.format, placeholder, config.append)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    pub fn template(&self) -> Template {
        self.template
            .read()
            .map(|t| t.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    /// Replace the template. Placeholders are re-parsed only if the text changed.
    pub fn set_template(&self, source: &str) {
        let mut template = self.template.write().unwrap_or_else(|p| p.into_inner());
        if template.source() != source {
            *template = Template::new(source);
        }
    }

    /// Text this sink writes for `track`, or the placeholder text when stopped
    pub fn content(&self, track: Option<&Track>) -> String {
        match track {
            Some(track) => self
                .template
                .read()
                .map(|t| t.render(Some(track)))
                .unwrap_or_else(|p| p.into_inner().render(Some(track))),
            None => self.placeholder.render(None),
        }
    }

    /// Render and write. Appending sinks add one line per write.
    pub fn render(&self, track: Option<&Track>) -> std::result::Result<(), SinkError> {
        let content = self.content(track);
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let result = if self.append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .and_then(|mut file| writeln!(file, "{}", content))
        } else {
            fs::write(&self.path, &content)
        };

        result.map_err(|source| SinkError {
            path: self.path.clone(),
            source,
        })?;
        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

/// All configured sinks, unique by destination
#[derive(Default, Clone)]
pub struct SinkSet {
    sinks: Vec<Arc<OutputSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GeneralConfig) -> Result<Self> {
        let mut set = Self::new();
        for sink in &config.output_formatters {
            set.add(OutputSink::from_config(sink, &config.placeholder_text))?;
        }
        Ok(set)
    }

    /// Register a sink, rejecting a second sink for the same file
    pub fn add(&mut self, sink: OutputSink) -> Result<()> {
        let path = canonical_path(sink.path());
        if self.sinks.iter().any(|s| canonical_path(s.path()) == path) {
            return Err(Error::DuplicateSink(path));
        }
        self.sinks.push(Arc::new(sink));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<OutputSink>> {
        self.sinks.iter()
    }

    /// Render every sink on the calling thread, collecting failures
    pub fn render_all(&self, track: Option<&Track>) -> Vec<SinkError> {
        self.sinks
            .iter()
            .filter_map(|sink| sink.render(track).err())
            .collect()
    }

    /// Queue one render job per sink on `pool`. Failures are logged.
    pub fn dispatch(&self, pool: &WorkerPool, track: Option<Arc<Track>>) {
        for sink in &self.sinks {
            let key = sink.path().to_path_buf();
            let sink = Arc::clone(sink);
            let track = track.clone();
            pool.execute(&key, move || {
                if let Err(e) = sink.render(track.as_deref()) {
                    warn!("{}", e);
                }
            });
        }
    }
}
