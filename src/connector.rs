//! Connector facade: one transport, one atom cache.
//!
//! The `Connector` is what host bindings talk to. Node creation is
//! idempotent per `(kind, name)` and never fails because the server is
//! unreachable: the cache is authoritative for identity and the server is
//! notified best-effort through [`Transport::dispatch`], which falls back to
//! the staging directory while offline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::atom::{Atom, AtomIdAllocator, Link, Node, NodeKind, TruthValue, number_name};
use crate::cache::{AtomCache, Cached, NodeKey};
use crate::config::BridgeConfig;
use crate::error::{AtomError, BridgeResult, TransportError};
use crate::transport::{ConnectionState, Delivery, FallbackQueue, Transport};

/// Estimated bytes per cached node, for [`MemoryStats::memory_usage_mb`].
const NODE_BYTES: f64 = 64.0;
/// Estimated bytes per registered link.
const LINK_BYTES: f64 = 128.0;

/// Owns the server connection and the atom cache for one bridge instance.
pub struct Connector {
    config: BridgeConfig,
    transport: Mutex<Transport>,
    cache: AtomCache,
    ids: AtomIdAllocator,
}

impl Connector {
    /// Create a disconnected connector. Nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(config: BridgeConfig) -> Self {
        let transport = Transport::new(&config);
        tracing::info!(
            endpoint = %config.endpoint(),
            staging_dir = %config.staging_dir.display(),
            "connector created"
        );
        Self {
            config,
            transport: Mutex::new(transport),
            cache: AtomCache::new(),
            ids: AtomIdAllocator::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn transport(&self) -> MutexGuard<'_, Transport> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect to the configured endpoint.
    pub fn connect(&self) -> BridgeResult<()> {
        self.connect_to(&self.config.host, self.config.port)
    }

    /// Connect to an explicit endpoint, replacing any current connection.
    pub fn connect_to(&self, host: &str, port: u16) -> BridgeResult<()> {
        Ok(self.transport().connect(host, port)?)
    }

    pub fn disconnect(&self) {
        self.transport().disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport().state()
    }

    /// Best-effort remote notification. Failures are logged, never returned.
    fn notify(&self, command: &str) -> Option<Delivery> {
        match self.transport().dispatch(command) {
            Ok(delivery) => {
                tracing::debug!(command, ?delivery, "notified");
                Some(delivery)
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "notification dropped");
                None
            }
        }
    }

    /// Get or create the node for `(kind, name)`.
    ///
    /// Only a cache miss reaches the transport. Number names are
    /// canonicalized first, so `"3.0"` and `"3"` are the same node.
    pub fn create_node(&self, kind: NodeKind, name: &str) -> BridgeResult<Arc<Node>> {
        let name = match kind {
            NodeKind::Number => {
                let value: f64 = name
                    .trim()
                    .parse()
                    .map_err(|_| AtomError::InvalidNumberText {
                        text: name.to_string(),
                    })?;
                number_name(value)?
            }
            NodeKind::Concept | NodeKind::Predicate => name.to_string(),
        };

        let cached = self
            .cache
            .get_or_insert_with(NodeKey::new(kind, name), |key| {
                Ok::<_, AtomError>(Node::new(self.ids.next_id()?, key.kind, key.name.clone()))
            })?;
        if let Cached::Inserted(node) = &cached {
            tracing::debug!(kind = %node.kind, name = %node.name, id = %node.id, "node created");
            self.notify(&node.to_command());
        }
        Ok(cached.into_node())
    }

    pub fn create_concept_node(&self, name: &str) -> BridgeResult<Arc<Node>> {
        self.create_node(NodeKind::Concept, name)
    }

    pub fn create_predicate_node(&self, name: &str) -> BridgeResult<Arc<Node>> {
        self.create_node(NodeKind::Predicate, name)
    }

    pub fn create_number_node(&self, value: f64) -> BridgeResult<Arc<Node>> {
        self.create_node(NodeKind::Number, &number_name(value)?)
    }

    fn build_link(
        &self,
        kind: &str,
        outgoing: Vec<Atom>,
        truth: TruthValue,
    ) -> BridgeResult<(Arc<Link>, Option<Delivery>)> {
        let link = Arc::new(Link::new(self.ids.next_id()?, kind, outgoing)?.with_truth(truth));
        self.cache.register_link(Arc::clone(&link));
        tracing::debug!(kind, id = %link.id, arity = link.arity(), "link created");
        let delivery = self.notify(&link.to_command());
        Ok((link, delivery))
    }

    /// Create a fresh link. Links are never deduplicated by content.
    pub fn create_link(&self, kind: &str, outgoing: Vec<Atom>) -> BridgeResult<Arc<Link>> {
        self.create_link_with_truth(kind, outgoing, TruthValue::DEFAULT)
    }

    pub fn create_link_with_truth(
        &self,
        kind: &str,
        outgoing: Vec<Atom>,
        truth: TruthValue,
    ) -> BridgeResult<Arc<Link>> {
        Ok(self.build_link(kind, outgoing, truth)?.0)
    }

    /// `(InheritanceLink child parent)`
    pub fn create_inheritance_link(
        &self,
        child: impl Into<Atom>,
        parent: impl Into<Atom>,
    ) -> BridgeResult<Arc<Link>> {
        self.create_link(Link::INHERITANCE, vec![child.into(), parent.into()])
    }

    /// `(EvaluationLink predicate args...)`
    pub fn create_evaluation_link(
        &self,
        predicate: Arc<Node>,
        args: Vec<Atom>,
    ) -> BridgeResult<Arc<Link>> {
        let mut outgoing = Vec::with_capacity(args.len() + 1);
        outgoing.push(Atom::Node(predicate));
        outgoing.extend(args);
        self.create_link(Link::EVALUATION, outgoing)
    }

    /// Send a raw command, queueing it to the fallback channel when offline.
    pub fn send_command(&self, command: &str) -> BridgeResult<Delivery> {
        Ok(self.transport().dispatch(command)?)
    }

    /// Request/response round trip within the configured response window.
    ///
    /// Empty when disconnected or when no reply arrived in time.
    pub fn evaluate(&self, command: &str) -> String {
        self.transport().evaluate(command)
    }

    pub fn evaluate_with_timeout(&self, command: &str, timeout: Duration) -> String {
        self.transport().evaluate_with_timeout(command, timeout)
    }

    /// Run a named operation over concept operands on the server.
    ///
    /// Requires a live connection: returns `Ok(false)` without creating
    /// anything when disconnected, and `Ok(true)` only when the
    /// `EvaluationLink` went out over the socket.
    pub fn execute_operation(&self, operation: &str, operands: &[&str]) -> BridgeResult<bool> {
        if !self.is_connected() {
            tracing::debug!(operation, "execute_operation skipped: not connected");
            return Ok(false);
        }
        let predicate = self.create_predicate_node(operation)?;
        let mut outgoing = vec![Atom::Node(predicate)];
        for operand in operands {
            outgoing.push(Atom::Node(self.create_concept_node(operand)?));
        }
        let (_, delivery) = self.build_link(Link::EVALUATION, outgoing, TruthValue::DEFAULT)?;
        Ok(delivery == Some(Delivery::Sent))
    }

    /// Number of cached nodes (not a server-side count).
    pub fn count_nodes(&self) -> usize {
        self.cache.node_count()
    }

    /// Number of links created through this connector.
    pub fn count_links(&self) -> usize {
        self.cache.link_count()
    }

    /// Every cached node with this name, across kinds.
    pub fn find_nodes_by_name(&self, name: &str) -> Vec<Arc<Node>> {
        self.cache.nodes_named(name)
    }

    pub fn cache(&self) -> &AtomCache {
        &self.cache
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats::new(self.count_nodes(), self.count_links())
    }

    /// Fallback queue of this connector's transport.
    pub fn fallback(&self) -> FallbackQueue {
        FallbackQueue::new(self.config.staging_dir.clone())
    }

    /// Push queued fallback commands through the live socket, oldest first.
    ///
    /// Stops at the first command the socket refuses; that command and
    /// everything after it stay queued. Returns how many were replayed.
    pub fn replay_fallback(&self) -> BridgeResult<usize> {
        let mut transport = self.transport();
        if !transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let queue = FallbackQueue::new(transport.fallback().dir().to_path_buf());
        let replayed = queue.drain(|command| transport.send(command).is_ok())?;
        tracing::info!(replayed, dir = %queue.dir().display(), "fallback queue replayed");
        Ok(replayed)
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("nodes", &self.count_nodes())
            .field("links", &self.count_links())
            .finish()
    }
}

/// Point-in-time statistics over the local cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub node_count: usize,
    pub link_count: usize,
    /// `ln(nodes + 1) * ln(links + 1)`
    pub complexity_score: f64,
    pub memory_usage_mb: f64,
}

impl MemoryStats {
    pub fn new(node_count: usize, link_count: usize) -> Self {
        let n = node_count as f64;
        let l = link_count as f64;
        Self {
            node_count,
            link_count,
            complexity_score: (n + 1.0).ln() * (l + 1.0).ln(),
            memory_usage_mb: (n * NODE_BYTES + l * LINK_BYTES) / (1024.0 * 1024.0),
        }
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cogbridge memory stats")?;
        writeln!(f, "  nodes:       {}", self.node_count)?;
        writeln!(f, "  links:       {}", self.link_count)?;
        writeln!(f, "  complexity:  {:.4}", self.complexity_score)?;
        writeln!(f, "  memory (MB): {:.6}", self.memory_usage_mb)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::io::BufRead;
    use std::net::TcpListener;

    fn offline(dir: &tempfile::TempDir) -> Connector {
        Connector::new(BridgeConfig {
            staging_dir: dir.path().to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn same_key_returns_same_node_and_queues_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        let a = conn.create_concept_node("Foo").unwrap();
        let b = conn.create_concept_node("Foo").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(conn.count_nodes(), 1);
        assert_eq!(conn.fallback().len(), 1);
    }

    #[test]
    fn number_names_are_canonical() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        let a = conn.create_number_node(3.0).unwrap();
        let b = conn.create_node(NodeKind::Number, "3.0").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.to_command(), "(NumberNode 3)");
        assert!(conn.create_number_node(f64::INFINITY).is_err());
    }

    #[test]
    fn unparseable_number_name_is_reported_as_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        let err = conn.create_node(NodeKind::Number, "three").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Atom(AtomError::InvalidNumberText { ref text }) if text == "three"
        ));
        assert!(err.to_string().contains("\"three\""));
        assert_eq!(conn.count_nodes(), 0);
    }

    #[test]
    fn concurrent_creation_of_one_name_yields_one_node() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);

        let nodes: Vec<Arc<Node>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| conn.create_concept_node("same").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(nodes.iter().all(|n| Arc::ptr_eq(n, &nodes[0])));
        assert_eq!(conn.count_nodes(), 1);
        assert_eq!(conn.fallback().len(), 1);
    }

    #[test]
    fn links_are_fresh_every_time() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        let cat = conn.create_concept_node("cat").unwrap();
        let animal = conn.create_concept_node("animal").unwrap();
        let l1 = conn
            .create_inheritance_link(Arc::clone(&cat), Arc::clone(&animal))
            .unwrap();
        let l2 = conn.create_inheritance_link(cat, animal).unwrap();
        assert_ne!(l1.id, l2.id);
        assert_eq!(conn.count_links(), 2);
        assert_eq!(
            l1.to_command(),
            "(InheritanceLink (ConceptNode \"cat\") (ConceptNode \"animal\"))"
        );
    }

    #[test]
    fn empty_link_is_a_caller_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        assert!(conn.create_link("ListLink", Vec::new()).is_err());
        assert_eq!(conn.count_links(), 0);
    }

    #[test]
    fn evaluation_link_puts_predicate_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        let pred = conn.create_predicate_node("chases").unwrap();
        let cat = conn.create_concept_node("cat").unwrap();
        let link = conn.create_evaluation_link(pred, vec![cat.into()]).unwrap();
        assert_eq!(
            link.to_command(),
            "(EvaluationLink (PredicateNode \"chases\") (ConceptNode \"cat\"))"
        );
    }

    #[test]
    fn find_nodes_across_kinds() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        conn.create_concept_node("x").unwrap();
        conn.create_predicate_node("x").unwrap();
        conn.create_concept_node("y").unwrap();
        assert_eq!(conn.find_nodes_by_name("x").len(), 2);
        assert!(conn.find_nodes_by_name("z").is_empty());
    }

    #[test]
    fn offline_operations_degrade_quietly() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        assert!(conn.evaluate("(ping)").is_empty());
        assert!(!conn.execute_operation("merge", &["a", "b"]).unwrap());
        assert_eq!(conn.count_nodes(), 0);
        assert!(conn.replay_fallback().is_err());
        assert!(matches!(conn.send_command("(ping)").unwrap(), Delivery::Queued(_)));
    }

    #[test]
    fn stats_follow_counts() {
        let stats = MemoryStats::new(0, 0);
        assert_eq!(stats.complexity_score, 0.0);
        let stats = MemoryStats::new(2, 1);
        assert!((stats.complexity_score - 3f64.ln() * 2f64.ln()).abs() < 1e-12);
        assert!((stats.memory_usage_mb - 256.0 / 1_048_576.0).abs() < 1e-15);
    }

    #[test]
    fn replay_drains_queue_through_socket() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = offline(&dir);
        conn.create_concept_node("a").unwrap();
        conn.create_concept_node("b").unwrap();
        assert_eq!(conn.fallback().len(), 2);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let reader = std::io::BufReader::new(stream);
            reader.lines().take(2).map(|l| l.unwrap()).collect::<Vec<_>>()
        });

        conn.connect_to("127.0.0.1", port).unwrap();
        assert_eq!(conn.replay_fallback().unwrap(), 2);
        assert!(conn.fallback().is_empty());
        assert_eq!(
            server.join().unwrap(),
            vec!["(ConceptNode \"a\")", "(ConceptNode \"b\")"]
        );
    }
}
