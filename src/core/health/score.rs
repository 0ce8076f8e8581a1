//! Health scoring shared by the tracker and the discovery validator

use crate::core::discovery::types::ValidationResult;

/// Score a probe outcome into [0, 1]
///
/// Reachability is worth 0.3; a recognized wire shape 0.2; latency under
/// 500 ms 0.2 (0.1 under 1000 ms); each observed feature 0.1; at least one
/// enumerated model 0.1.
pub fn health_score(result: &ValidationResult) -> f64 {
    if !result.reachable {
        return 0.0;
    }

    let mut score: f64 = 0.3;

    if result.compatibility != crate::core::types::Compatibility::Unknown {
        score += 0.2;
    }

    if result.latency_ms < 500 {
        score += 0.2;
    } else if result.latency_ms < 1000 {
        score += 0.1;
    }

    if result.capabilities.streaming {
        score += 0.1;
    }
    if result.capabilities.json_mode {
        score += 0.1;
    }
    if result.capabilities.tools {
        score += 0.1;
    }

    if !result.models.is_empty() {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}
