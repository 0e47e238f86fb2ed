//! Capability traits for live connection and session handles
//!
//! The registry never talks to the broker. Whatever establishes connections
//! hands it a value that can report the handful of properties below; a
//! property that cannot be read is reported as a [`HandleError`] and replaced
//! by the unknown sentinel at tracking time.

/// A handle could not report one of its properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleError {
    /// Name of the property that failed
    pub property: &'static str,
    /// Reason reported by the handle
    pub message: String,
}

impl HandleError {
    /// Create a new handle error
    pub fn new(property: &'static str, message: impl Into<String>) -> Self {
        Self {
            property,
            message: message.into(),
        }
    }

    /// The property is not available on this handle
    pub fn missing(property: &'static str) -> Self {
        Self::new(property, "property not reported")
    }
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot read {}: {}", self.property, self.message)
    }
}

impl std::error::Error for HandleError {}

/// Properties a live parent connection can report
pub trait ConnectionHandle {
    /// Broker-issued connection identifier (fixed-length hex)
    fn identifier(&self) -> Result<String, HandleError>;

    /// Broker-issued correlation tag, `None` if the broker did not issue one
    fn correlation_tag(&self) -> Result<Option<String>, HandleError>;

    /// Node the client library resolved this connection to
    fn resolved_node(&self) -> Result<String, HandleError>;

    fn host(&self) -> Result<String, HandleError>;

    fn port(&self) -> Result<u16, HandleError>;
}

/// Properties a live session can report
pub trait SessionHandle {
    /// Correlation tag as seen from the session
    fn correlation_tag(&self) -> Result<Option<String>, HandleError>;

    /// Node the session is currently served by
    fn resolved_node(&self) -> Result<String, HandleError>;

    /// Whether the session is transacted
    fn transacted(&self) -> Result<bool, HandleError>;

    /// Raw acknowledgement mode code
    fn acknowledge_mode(&self) -> Result<i32, HandleError>;

    /// Label of the thread that opened the session
    fn thread_label(&self) -> Result<String, HandleError>;
}

/// Connection handle backed by captured property values
///
/// Useful for replaying evidence collected elsewhere and for tests. Any
/// property left as `None` (except the tag) reports [`HandleError::missing`].
#[derive(Debug, Clone, Default)]
pub struct StaticConnection {
    pub identifier: Option<String>,
    pub tag: Option<String>,
    pub resolved_node: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl StaticConnection {
    /// Create a handle with identifier, tag and resolved node set
    pub fn new(
        identifier: impl Into<String>,
        tag: impl Into<String>,
        resolved_node: impl Into<String>,
    ) -> Self {
        Self {
            identifier: Some(identifier.into()),
            tag: Some(tag.into()),
            resolved_node: Some(resolved_node.into()),
            host: None,
            port: None,
        }
    }

    /// Set the endpoint
    pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }
}

impl ConnectionHandle for StaticConnection {
    fn identifier(&self) -> Result<String, HandleError> {
        self.identifier
            .clone()
            .ok_or_else(|| HandleError::missing("identifier"))
    }

    fn correlation_tag(&self) -> Result<Option<String>, HandleError> {
        Ok(self.tag.clone())
    }

    fn resolved_node(&self) -> Result<String, HandleError> {
        self.resolved_node
            .clone()
            .ok_or_else(|| HandleError::missing("resolved_node"))
    }

    fn host(&self) -> Result<String, HandleError> {
        self.host.clone().ok_or_else(|| HandleError::missing("host"))
    }

    fn port(&self) -> Result<u16, HandleError> {
        self.port.ok_or_else(|| HandleError::missing("port"))
    }
}

/// Session handle backed by captured property values
#[derive(Debug, Clone)]
pub struct StaticSession {
    pub tag: Option<String>,
    pub resolved_node: Option<String>,
    pub transacted: bool,
    pub acknowledge_mode: i32,
    pub thread_label: Option<String>,
}

impl StaticSession {
    /// Create a non-transacted, auto-acknowledge session handle
    pub fn new(tag: impl Into<String>, resolved_node: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            resolved_node: Some(resolved_node.into()),
            transacted: false,
            acknowledge_mode: 1,
            thread_label: None,
        }
    }

    /// Mark the session transacted
    pub fn as_transacted(mut self) -> Self {
        self.transacted = true;
        self.acknowledge_mode = 0;
        self
    }

    /// Set the originating thread label
    pub fn on_thread(mut self, label: impl Into<String>) -> Self {
        self.thread_label = Some(label.into());
        self
    }
}

impl SessionHandle for StaticSession {
    fn correlation_tag(&self) -> Result<Option<String>, HandleError> {
        Ok(self.tag.clone())
    }

    fn resolved_node(&self) -> Result<String, HandleError> {
        self.resolved_node
            .clone()
            .ok_or_else(|| HandleError::missing("resolved_node"))
    }

    fn transacted(&self) -> Result<bool, HandleError> {
        Ok(self.transacted)
    }

    fn acknowledge_mode(&self) -> Result<i32, HandleError> {
        Ok(self.acknowledge_mode)
    }

    fn thread_label(&self) -> Result<String, HandleError> {
        self.thread_label
            .clone()
            .ok_or_else(|| HandleError::missing("thread_label"))
    }
}
