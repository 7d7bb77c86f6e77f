//! # Renderer Errors and Warnings
//!
//! Failures fall into two groups:
//!
//! - **Errors** ([`RenderError`]) abort the current frame or pass and are
//!   returned to the view driver: context creation failures and calls made
//!   outside the frame/pass protocol.
//! - **Warnings** ([`RenderWarning`]) describe per-primitive problems that
//!   the renderer recovered from, by skipping the primitive or taking a
//!   slower path. They are logged and collected in a [`WarningLog`] for the
//!   view to drain after the frame.

use thiserror::Error;

use super::gpu::DeviceError;
use crate::config::ConfigError;
use crate::scene::{GeometryKind, ObjectId};

/// Fatal renderer errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// The GPU context for the draw context could not be created
    ///
    /// Fatal for the frame; no drawing occurred and renderer state is
    /// unchanged. The caller decides whether to retry or fall back.
    #[error("Draw context creation failed: {0}")]
    ContextCreationFailed(#[source] DeviceError),

    /// A call was made outside the frame/pass protocol
    ///
    /// In debug builds these also trip a debug assertion.
    #[error("Invalid renderer state: {0}")]
    InvalidState(&'static str),

    /// Resource creation failed in a way that cannot be recovered locally
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(#[from] DeviceError),

    /// Renderer configuration was rejected
    #[error("Invalid renderer configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Report a protocol violation
///
/// Asserts in debug builds; release builds get an error value.
pub(crate) fn contract_violation(what: &'static str) -> RenderError {
    log::error!("Renderer contract violation: {}", what);
    debug_assert!(false, "renderer contract violation: {what}");
    RenderError::InvalidState(what)
}

/// Result of ending a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// The frame is complete
    Done,
    /// Another pass over the scene is required
    Retraverse,
}

/// Recoverable problems encountered while rendering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderWarning {
    /// More lights were supplied than there are GPU slots
    #[error("{supplied} lights supplied but only {max} can be enabled; the rest are ignored")]
    LightsDropped {
        /// Non-ambient lights in the light group
        supplied: usize,
        /// Available slots
        max: usize,
    },

    /// A GPU buffer could not be allocated; geometry was drawn uncached
    #[error("Vertex buffer allocation failed ({reason}); drawing without a cached buffer")]
    BufferAllocationFailed {
        /// Device error text
        reason: String,
    },

    /// A texture could not be uploaded; geometry was drawn untextured
    #[error("Texture upload failed ({reason}); drawing untextured")]
    TextureUploadFailed {
        /// Device error text
        reason: String,
    },

    /// A TriMesh triangle referenced a point that does not exist
    #[error("TriMesh {object:?} references point {index} of {point_count}; mesh skipped")]
    InvalidTriMeshIndex {
        /// Offending mesh
        object: ObjectId,
        /// Bad index
        index: u32,
        /// Number of points in the mesh
        point_count: usize,
    },

    /// An attribute array does not have one entry per vertex or face
    #[error("TriMesh {object:?} array {array} has {actual} entries, expected {expected}; mesh skipped")]
    MalformedAttributeArray {
        /// Offending mesh
        object: ObjectId,
        /// Array name
        array: &'static str,
        /// Required length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Vertex data contained NaN or infinity; the primitive was skipped
    #[error("Non-finite vertex data in {kind:?}; {skipped} primitive(s) skipped")]
    NonFiniteVertex {
        /// Geometry kind
        kind: GeometryKind,
        /// Number of primitives dropped
        skipped: usize,
    },

    /// A PolyLine's segment attribute list does not match its segments
    #[error("PolyLine has {segments} segments but {actual} segment attribute sets; segment attributes ignored")]
    SegmentAttributeMismatch {
        /// Number of segments
        segments: usize,
        /// Number of attribute sets supplied
        actual: usize,
    },

    /// Geometry with too few vertices to draw
    #[error("Degenerate {kind:?} skipped")]
    DegenerateGeometry {
        /// Geometry kind
        kind: GeometryKind,
    },
}

/// Collected warnings for the current frame
#[derive(Debug, Default)]
pub struct WarningLog {
    warnings: Vec<RenderWarning>,
}

impl WarningLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning
    pub fn post(&mut self, warning: RenderWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Remove and return everything recorded so far
    pub fn take(&mut self) -> Vec<RenderWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> &[RenderWarning] {
        &self.warnings
    }

    /// Number of warnings recorded
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_log_take_drains() {
        let mut log = WarningLog::new();
        log.post(RenderWarning::DegenerateGeometry { kind: GeometryKind::PolyLine });
        assert_eq!(log.len(), 1);

        let taken = log.take();
        assert_eq!(taken.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_device_error_converts() {
        let err: RenderError = DeviceError::BufferAllocation("out of memory".to_string()).into();
        assert!(matches!(err, RenderError::BackendError(_)));
        assert!(err.to_string().contains("out of memory"));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_contract_violation_asserts_in_debug() {
        let _ = contract_violation("submit outside pass");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_contract_violation_returns_error_in_release() {
        assert!(matches!(contract_violation("submit outside pass"), RenderError::InvalidState(_)));
    }
}
