use crate::engine::config::Configuration;

use super::animation::{CONTROL_NODE_MARKER, DEFAULT_TICKS_PER_SECOND};

/// Tunables of the animation import and playback.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSettings {
    /// Ticks per second of clips that do not specify it.
    pub fallback_ticks_per_second: f64,
    /// Scene nodes with this in their name are excluded from skeletons.
    pub control_node_marker: String,
    /// Clip new characters start with.
    pub default_clip: usize,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            fallback_ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            control_node_marker: CONTROL_NODE_MARKER.to_string(),
            default_clip: 0,
        }
    }
}

impl AnimationSettings {
    pub fn from_config(config: &Configuration) -> Self {
        let defaults = Self::default();

        let fallback_ticks_per_second = config
            .get::<f64>("animation.fallback_ticks_per_second")
            .filter(|tps| {
                let valid = *tps > 0.0;
                if !valid {
                    tracing::warn!("animation.fallback_ticks_per_second must be positive, got {tps}");
                }
                valid
            })
            .unwrap_or(defaults.fallback_ticks_per_second);

        Self {
            fallback_ticks_per_second,
            control_node_marker: config
                .get_str("skeleton.control_node_marker")
                .map(str::to_string)
                .unwrap_or(defaults.control_node_marker),
            default_clip: config
                .get("animation.default_clip")
                .unwrap_or(defaults.default_clip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = AnimationSettings::from_config(&Configuration::default());
        assert_eq!(settings, AnimationSettings::default());
        assert_eq!(settings.fallback_ticks_per_second, 24.0);
        assert_eq!(settings.control_node_marker, "Ctrl");
        assert_eq!(settings.default_clip, 0);
    }

    #[test]
    fn overrides() {
        let config = Configuration::parse(
            "animation.fallback_ticks_per_second=30\n\
             skeleton.control_node_marker=Helper\n\
             animation.default_clip=2\n",
        )
        .unwrap();

        let settings = AnimationSettings::from_config(&config);
        assert_eq!(settings.fallback_ticks_per_second, 30.0);
        assert_eq!(settings.control_node_marker, "Helper");
        assert_eq!(settings.default_clip, 2);
    }

    #[test]
    fn invalid_values_use_defaults() {
        let config = Configuration::parse(
            "animation.fallback_ticks_per_second=-5\n\
             animation.default_clip=first\n",
        )
        .unwrap();

        let settings = AnimationSettings::from_config(&config);
        assert_eq!(settings.fallback_ticks_per_second, 24.0);
        assert_eq!(settings.default_clip, 0);
    }
}
