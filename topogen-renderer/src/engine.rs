//! Tera rendering engine bound to a [`TemplateContext`].
//!
//! Templates are rendered against an empty Tera context; all topology data
//! is reached through the functions below, each closed over the snapshot of
//! the current cycle.
//!
//! | Function        | Arguments                              | Returns                  |
//! |-----------------|----------------------------------------|--------------------------|
//! | `services()`    | `stack?`, `kind?`, `label?`            | list of services         |
//! | `service()`     | `name`, `stack?` (default: self stack) | a service or null        |
//! | `containers()`  | `service?`, `stack?`, `label?`, `host?`| list of containers       |
//! | `hosts()`       | `label?`                               | list of hosts            |
//! | `host()`        | `uuid?` (default: self host)           | a host or null           |
//! | `self_info()`   | none                                   | the process's own record |
//!
//! `label` takes the same `name` / `name:value` form as `notify_lbl`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tera::{Function, Tera, Value};

use topogen_core::LabelSelector;

use crate::context::TemplateContext;
use crate::error::RenderError;

type Args = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn opt_str<'a>(args: &'a Args, key: &str) -> tera::Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(tera::Error::msg(format!(
            "argument `{key}` must be a string, got {other}"
        ))),
    }
}

fn req_str<'a>(args: &'a Args, func: &str, key: &str) -> tera::Result<&'a str> {
    opt_str(args, key)?
        .ok_or_else(|| tera::Error::msg(format!("`{func}` requires a `{key}` argument")))
}

fn opt_selector(args: &Args) -> tera::Result<Option<LabelSelector>> {
    opt_str(args, "label")?
        .map(|s| s.parse::<LabelSelector>())
        .transpose()
        .map_err(|e| tera::Error::msg(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> tera::Result<Value> {
    serde_json::to_value(value).map_err(|e| tera::Error::msg(e.to_string()))
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn services_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let stack = opt_str(args, "stack")?;
        let kind = opt_str(args, "kind")?;
        let selector = opt_selector(args)?;
        let found: Vec<_> = ctx
            .services
            .iter()
            .filter(|s| stack.map_or(true, |v| s.stack == v))
            .filter(|s| kind.map_or(true, |v| s.kind == v))
            .filter(|s| selector.as_ref().map_or(true, |sel| sel.matches(&s.labels)))
            .collect();
        to_json(&found)
    }
}

fn service_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let name = req_str(args, "service", "name")?;
        let stack = opt_str(args, "stack")?.unwrap_or(ctx.self_info.stack.as_str());
        match ctx
            .services
            .iter()
            .find(|s| s.name == name && s.stack == stack)
        {
            Some(service) => to_json(service),
            None => Ok(Value::Null),
        }
    }
}

fn containers_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let service = opt_str(args, "service")?;
        let stack = opt_str(args, "stack")?;
        let host = opt_str(args, "host")?;
        let selector = opt_selector(args)?;
        let found: Vec<_> = ctx
            .containers
            .iter()
            .filter(|c| service.map_or(true, |v| c.service == v))
            .filter(|c| stack.map_or(true, |v| c.stack == v))
            .filter(|c| host.map_or(true, |v| c.host.uuid == v || c.host.name == v))
            .filter(|c| selector.as_ref().map_or(true, |sel| sel.matches(&c.labels)))
            .collect();
        to_json(&found)
    }
}

fn hosts_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let selector = opt_selector(args)?;
        let found: Vec<_> = ctx
            .hosts
            .iter()
            .filter(|h| selector.as_ref().map_or(true, |sel| sel.matches(&h.labels)))
            .collect();
        to_json(&found)
    }
}

fn host_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let uuid = opt_str(args, "uuid")?.unwrap_or(ctx.self_info.host_uuid.as_str());
        match ctx.hosts.iter().find(|h| h.uuid == uuid) {
            Some(host) => to_json(host),
            None => Ok(Value::Null),
        }
    }
}

fn self_fn(ctx: Arc<TemplateContext>) -> impl Function {
    move |_args: &Args| -> tera::Result<Value> { to_json(&ctx.self_info) }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera engine whose functions read one [`TemplateContext`].
///
/// Build one per cycle from that cycle's snapshot.
pub struct TemplateEngine {
    ctx: Arc<TemplateContext>,
}

impl TemplateEngine {
    pub fn new(ctx: Arc<TemplateContext>) -> Self {
        TemplateEngine { ctx }
    }

    pub fn context(&self) -> &TemplateContext {
        &self.ctx
    }

    fn tera(&self) -> Tera {
        let mut tera = Tera::default();
        // Output is configuration, not HTML.
        tera.autoescape_on(vec![]);
        tera.register_function("services", services_fn(Arc::clone(&self.ctx)));
        tera.register_function("service", service_fn(Arc::clone(&self.ctx)));
        tera.register_function("containers", containers_fn(Arc::clone(&self.ctx)));
        tera.register_function("hosts", hosts_fn(Arc::clone(&self.ctx)));
        tera.register_function("host", host_fn(Arc::clone(&self.ctx)));
        tera.register_function("self_info", self_fn(Arc::clone(&self.ctx)));
        tera
    }

    /// Render template text registered under `name`.
    pub fn render_str(&self, name: &str, source: &str) -> Result<String, RenderError> {
        let mut tera = self.tera();
        tera.add_raw_template(name, source)
            .map_err(|e| RenderError::Parse {
                name: name.to_string(),
                source: e,
            })?;
        tera.render(name, &tera::Context::new())
            .map_err(|e| RenderError::Render {
                name: name.to_string(),
                source: e,
            })
    }

    /// Read and render the template file at `path`.
    ///
    /// The template is named after the file's basename.
    pub fn render_file(&self, path: &Path) -> Result<Vec<u8>, RenderError> {
        if !path.exists() {
            return Err(RenderError::Missing {
                path: path.to_path_buf(),
            });
        }
        let source = std::fs::read_to_string(path).map_err(|e| RenderError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.render_str(&name, &source).map(String::into_bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
