//! Render input assembled from the model and controller state.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::{EdgeSettings, HealthSettings};
use crate::model::{Backend, ConfigModel, L4Mapping, Server};

/// Everything a template can reference.
///
/// Borrows from the model so a render never copies the desired state.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext<'a> {
    pub backends: &'a [Backend],
    pub servers: &'a [Server],
    pub tcp_backends: &'a BTreeSet<L4Mapping>,
    pub udp_backends: &'a BTreeSet<L4Mapping>,
    pub global_settings: &'a BTreeMap<String, String>,
    pub healthz_host: &'a str,
    pub healthz_port: u16,
    pub healthz_path: &'a str,
    pub resolvers: &'a [String],
    pub cfg: &'a EdgeSettings,
}

impl<'a> TemplateContext<'a> {
    pub fn new(
        model: &'a ConfigModel,
        cfg: &'a EdgeSettings,
        health: &'a HealthSettings,
        resolvers: &'a [String],
    ) -> Self {
        Self {
            backends: &model.backends,
            servers: &model.servers,
            tcp_backends: &model.tcp_passthrough,
            udp_backends: &model.udp_passthrough,
            global_settings: &model.global_settings,
            healthz_host: &health.host,
            healthz_port: health.port,
            healthz_path: &health.path,
            resolvers,
            cfg,
        }
    }
}
