//! Template context: the cross-referenced topology snapshot built from raw
//! metadata.

use std::sync::Arc;

use serde::Serialize;

use topogen_core::{
    Container, Host, MetadataError, MetadataSource, RawContainer, RawHost, RawSelf, RawService,
    SelfInfo, Service, ServicePort,
};

/// One immutable snapshot of the fleet.
///
/// Built fresh for every cycle; nothing is carried over from earlier cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateContext {
    pub services: Vec<Service>,
    pub containers: Vec<Container>,
    pub hosts: Vec<Host>,
    #[serde(rename = "self")]
    pub self_info: SelfInfo,
}

impl TemplateContext {
    /// Normalise and cross-reference raw metadata.
    ///
    /// Containers get the first host whose UUID matches `host_uuid` (or the
    /// zero host); services get every container with the same stack and
    /// service name, in container order.
    pub fn from_raw(
        services: Vec<RawService>,
        containers: Vec<RawContainer>,
        hosts: Vec<RawHost>,
        self_container: RawSelf,
    ) -> Self {
        let hosts: Vec<Host> = hosts
            .into_iter()
            .map(|h| Host {
                uuid: h.uuid,
                name: h.name,
                address: h.agent_ip,
                hostname: h.hostname,
                labels: h.labels,
            })
            .collect();

        let containers: Vec<Container> = containers
            .into_iter()
            .map(|c| {
                let host = hosts
                    .iter()
                    .find(|h| h.uuid == c.host_uuid)
                    .cloned()
                    .unwrap_or_default();
                Container {
                    name: c.name,
                    address: c.primary_ip,
                    stack: c.stack_name,
                    service: c.service_name,
                    health: c.health_state,
                    state: c.state,
                    labels: c.labels,
                    host,
                }
            })
            .collect();

        let services: Vec<Service> = services
            .into_iter()
            .map(|s| {
                let members = containers
                    .iter()
                    .filter(|c| c.stack == s.stack_name && c.service == s.name)
                    .cloned()
                    .collect();
                let ports = parse_service_ports(&s.ports);
                Service {
                    name: s.name,
                    stack: s.stack_name,
                    kind: s.kind,
                    vip: s.vip,
                    fqdn: s.fqdn,
                    labels: s.labels,
                    metadata: s.metadata,
                    containers: members,
                    ports,
                }
            })
            .collect();

        TemplateContext {
            services,
            containers,
            hosts,
            self_info: SelfInfo {
                stack: self_container.stack_name,
                service: self_container.service_name,
                host_uuid: self_container.host_uuid,
            },
        }
    }
}

/// Builds [`TemplateContext`] snapshots from a [`MetadataSource`].
///
/// Cheap to construct and safe to call repeatedly; each [`build`](Self::build)
/// fetches everything again.
pub struct ContextBuilder<'a> {
    source: &'a dyn MetadataSource,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        Self { source }
    }

    /// Fetch services, containers, hosts and self, then cross-reference them.
    ///
    /// Any fetch failure fails the whole build; there are no partial snapshots.
    pub fn build(&self) -> Result<TemplateContext, MetadataError> {
        tracing::debug!("fetching metadata");
        let services = self.source.services()?;
        let containers = self.source.containers()?;
        let hosts = self.source.hosts()?;
        let self_container = self.source.self_container()?;
        Ok(TemplateContext::from_raw(
            services,
            containers,
            hosts,
            self_container,
        ))
    }

    /// [`build`](Self::build), shared for handing to a [`crate::TemplateEngine`].
    pub fn build_shared(&self) -> Result<Arc<TemplateContext>, MetadataError> {
        self.build().map(Arc::new)
    }
}

/// Parse `public:internal/protocol` port strings.
///
/// Anything else is dropped with a warning.
pub fn parse_service_ports(ports: &[String]) -> Vec<ServicePort> {
    ports
        .iter()
        .filter_map(|port| {
            let parsed = parse_service_port(port);
            if parsed.is_none() {
                tracing::warn!("unexpected format of service port: {port}");
            }
            parsed
        })
        .collect()
}

fn parse_service_port(port: &str) -> Option<ServicePort> {
    let parts: Vec<&str> = port.split(':').collect();
    let [public, rest] = parts.as_slice() else {
        return None;
    };
    let inner: Vec<&str> = rest.split('/').collect();
    let [internal, protocol] = inner.as_slice() else {
        return None;
    };
    Some(ServicePort {
        public_port: public.to_string(),
        internal_port: internal.to_string(),
        protocol: protocol.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use topogen_core::{Labels, MetadataDocument, MetadataVersion};

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn raw_container(name: &str, stack: &str, service: &str, host: &str) -> RawContainer {
        RawContainer {
            name: name.to_string(),
            primary_ip: format!("10.42.0.{}", name.len()),
            stack_name: stack.to_string(),
            service_name: service.to_string(),
            health_state: "healthy".to_string(),
            state: "running".to_string(),
            labels: labels(&[("io.rancher.stack.name", stack)]),
            host_uuid: host.to_string(),
        }
    }

    fn raw_host(uuid: &str, name: &str) -> RawHost {
        RawHost {
            uuid: uuid.to_string(),
            name: name.to_string(),
            agent_ip: format!("192.168.0.{}", name.len()),
            hostname: format!("{name}.example"),
            labels: Labels::new(),
        }
    }

    fn document() -> MetadataDocument {
        MetadataDocument {
            version: Some("1".to_string()),
            services: vec![
                RawService {
                    name: "web".to_string(),
                    stack_name: "front".to_string(),
                    kind: "service".to_string(),
                    ports: vec!["80:8080/tcp".to_string(), "bogus".to_string()],
                    ..Default::default()
                },
                RawService {
                    name: "web".to_string(),
                    stack_name: "staging".to_string(),
                    ..Default::default()
                },
            ],
            containers: vec![
                raw_container("front-web-1", "front", "web", "h-1"),
                raw_container("front-db-1", "front", "db", "h-2"),
                raw_container("front-web-2", "front", "web", "h-unknown"),
            ],
            hosts: vec![raw_host("h-1", "node-1"), raw_host("h-2", "node-2")],
            self_container: RawSelf {
                stack_name: "front".to_string(),
                service_name: "lb".to_string(),
                host_uuid: "h-1".to_string(),
            },
        }
    }

    #[test]
    fn containers_resolve_their_host() {
        let ctx = ContextBuilder::new(&document()).build().unwrap();
        assert_eq!(ctx.containers.len(), 3);
        assert_eq!(ctx.containers[0].host.name, "node-1");
        assert_eq!(ctx.containers[0].host.address, "192.168.0.6");
        assert_eq!(ctx.containers[1].host.name, "node-2");
        assert_eq!(ctx.containers[2].host, Host::default(), "unknown host is zero value");
    }

    #[test]
    fn first_matching_host_wins() {
        let mut doc = document();
        doc.hosts.push(raw_host("h-1", "duplicate"));
        let ctx = ContextBuilder::new(&doc).build().unwrap();
        assert_eq!(ctx.containers[0].host.name, "node-1");
    }

    #[test]
    fn services_aggregate_by_stack_and_name() {
        let ctx = ContextBuilder::new(&document()).build().unwrap();
        let front_web = &ctx.services[0];
        let names: Vec<_> = front_web.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["front-web-1", "front-web-2"]);
        assert!(ctx.services[1].containers.is_empty(), "stack must match too");
    }

    #[test]
    fn bad_ports_are_dropped_not_fatal() {
        let ctx = ContextBuilder::new(&document()).build().unwrap();
        assert_eq!(
            ctx.services[0].ports,
            vec![ServicePort {
                public_port: "80".to_string(),
                internal_port: "8080".to_string(),
                protocol: "tcp".to_string(),
            }]
        );
    }

    #[test]
    fn port_shapes() {
        let ports: Vec<String> = [
            "53:53/udp",
            "0.0.0.0:80:80/tcp",
            "8080/tcp",
            "80:80",
            "80:80/tcp/x",
            "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let parsed = parse_service_ports(&ports);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].protocol, "udp");
    }

    #[test]
    fn self_identity_is_copied() {
        let ctx = ContextBuilder::new(&document()).build().unwrap();
        assert_eq!(ctx.self_info.stack, "front");
        assert_eq!(ctx.self_info.service, "lb");
        assert_eq!(ctx.self_info.host_uuid, "h-1");
    }

    #[test]
    fn repeated_builds_are_identical() {
        let doc = document();
        let builder = ContextBuilder::new(&doc);
        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }

    struct FailingHosts {
        inner: MetadataDocument,
        fail: AtomicBool,
    }

    impl MetadataSource for FailingHosts {
        fn version(&self) -> Result<MetadataVersion, MetadataError> {
            self.inner.version()
        }
        fn services(&self) -> Result<Vec<RawService>, MetadataError> {
            self.inner.services()
        }
        fn containers(&self) -> Result<Vec<RawContainer>, MetadataError> {
            self.inner.containers()
        }
        fn hosts(&self) -> Result<Vec<RawHost>, MetadataError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(MetadataError::Io {
                    path: "hosts".into(),
                    source: std::io::Error::other("boom"),
                })
            } else {
                self.inner.hosts()
            }
        }
        fn self_container(&self) -> Result<RawSelf, MetadataError> {
            self.inner.self_container()
        }
    }

    #[test]
    fn fetch_failure_fails_the_whole_build() {
        let source = FailingHosts {
            inner: document(),
            fail: AtomicBool::new(true),
        };
        assert!(ContextBuilder::new(&source).build().is_err());

        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(ContextBuilder::new(&source).build().unwrap().hosts.len(), 2);
    }
}
