//! Audio media: clip lists over data providers.
//!
//! An [`AudioMediaData`] is one continuously addressable audio track built
//! from [`Clip`]s. Each clip is a time window into the PCM payload of one
//! provider. Edits never rewrite payloads: they store new audio in fresh
//! providers and recompute clip windows. Reads are served by a
//! [`ComposedStream`] over the clip byte ranges.

mod audio_media_data;
mod clip;
mod composed;
mod events;

pub use audio_media_data::AudioMediaData;
pub use clip::Clip;
pub use composed::{ComposedStream, SubStream};
pub use events::{AudioMediaEvent, SubscriptionId};
