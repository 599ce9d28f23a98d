//! Raw channel values → `[0, 1]` according to the channel's source and style.

use foundation::normalize::{
    DEFAULT_MIN_SPAN_FLOOR, normalize_cyclic_categorical, normalize_median_gamma,
    normalize_with_gamma,
};
use protocol::{Channel, FieldType, GammaSetting, SearchSettings, SourceKind};

use crate::datasets::DatasetRegistry;

/// Gamma factor for channels whose style asks for an automatic gamma.
pub const AUTO_GAMMA_FACTOR: f64 = 0.3;

/// Whether a channel's values are category indices that must not wrap.
///
/// Applies to cyclic channels fed by cluster or origin-query indices, or by a
/// number field that is integer-typed in any selected dataset.
pub fn is_cyclic_categorical(
    channel: Channel,
    settings: &SearchSettings,
    datasets: &DatasetRegistry,
) -> bool {
    if !channel.is_cyclic() {
        return false;
    }
    let source = settings.rendering.source(channel);
    match source.kind {
        kind if kind.is_categorical() => true,
        SourceKind::NumberField => datasets.field_has_type(
            &settings.dataset_ids,
            &source.parameter,
            FieldType::Integer,
        ),
        _ => false,
    }
}

/// Normalizes one received channel column for rendering.
pub fn normalize_channel(
    channel: Channel,
    values: &[f64],
    settings: &SearchSettings,
    datasets: &DatasetRegistry,
) -> Vec<f32> {
    let style = settings.frontend.rendering.style(channel);
    let normalized = match style.gamma {
        GammaSetting::Fixed(gamma) => normalize_with_gamma(values, gamma, DEFAULT_MIN_SPAN_FLOOR),
        GammaSetting::Auto if is_cyclic_categorical(channel, settings, datasets) => {
            normalize_cyclic_categorical(values, AUTO_GAMMA_FACTOR, DEFAULT_MIN_SPAN_FLOOR)
        }
        GammaSetting::Auto => {
            normalize_median_gamma(values, AUTO_GAMMA_FACTOR, DEFAULT_MIN_SPAN_FLOOR)
        }
    };
    normalized.into_iter().map(|v| v as f32).collect()
}
