//! Per-kind configuration records
//!
//! The resolver is generic; everything that differs between images, video,
//! audio and documents lives in a [`KindConfig`] looked up through the
//! [`KindRegistry`].

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::config::ResolverConfig;
use crate::heuristics::{contains_any, HeuristicResolver};
use crate::media::{MediaItem, MediaKind};
use crate::patterns::{KindNouns, PatternMatcher};
use crate::semantic::normalize_message;

pub const IMAGE_NOUNS: KindNouns = KindNouns {
    english: r"images?|pictures?|photos?|pics?|imgs?|illustrations?|drawings?|renders?|artworks?",
    russian: r"изображени\w*|картин\w*|фот\w*|снимо?к\w*|рисун\w*|иллюстраци\w*",
};

pub const VIDEO_NOUNS: KindNouns = KindNouns {
    english: r"videos?|clips?|movies?|footage|animations?|reels?",
    russian: r"видео\w*|ролик\w*|клип\w*|анимаци\w*|фильм\w*",
};

pub const AUDIO_NOUNS: KindNouns = KindNouns {
    english: r"audio|tracks?|songs?|sounds?|recordings?|tunes?|melod(?:y|ies)",
    russian: r"аудио\w*|трек\w*|песн\w*|песен|запис\w*|мелоди\w*|звук\w*|озвучк\w*",
};

pub const DOCUMENT_NOUNS: KindNouns = KindNouns {
    english: r"documents?|docs?|files?|pdfs?|reports?|texts?",
    russian: r"документ\w*|файл\w*|отчет\w*|текст\w*|пдф",
};

/// Derives result metadata from the chosen item
pub type MetadataExtractor = fn(&MediaItem) -> BTreeMap<String, Value>;

/// Phrases announcing that a request of one kind starts from an item of
/// another kind ("make a video from this image")
#[derive(Debug, Clone)]
pub struct CrossKindSource {
    pub source: MediaKind,
    pub phrases: Vec<&'static str>,
}

/// Everything kind-specific the resolver needs
#[derive(Debug, Clone)]
pub struct KindConfig {
    pub kind: MediaKind,
    pub patterns: PatternMatcher,
    pub heuristics: HeuristicResolver,
    pub cross_kind_sources: Vec<CrossKindSource>,
    pub metadata_extractor: MetadataExtractor,
}

impl KindConfig {
    /// Config with the shared word lists and templates for `nouns`
    pub fn new(kind: MediaKind, nouns: &KindNouns, config: &ResolverConfig) -> Self {
        Self {
            kind,
            patterns: PatternMatcher::for_nouns(nouns, &config.patterns),
            heuristics: HeuristicResolver::new(),
            cross_kind_sources: Vec::new(),
            metadata_extractor: no_metadata,
        }
    }

    pub fn with_edit_words(mut self, words: &[&'static str]) -> Self {
        self.heuristics.edit_words.extend_from_slice(words);
        self
    }

    pub fn with_style_words(mut self, words: &[&'static str]) -> Self {
        self.heuristics.style_words.extend_from_slice(words);
        self
    }

    pub fn with_cross_kind_source(mut self, source: MediaKind, phrases: &[&'static str]) -> Self {
        self.cross_kind_sources.push(CrossKindSource {
            source,
            phrases: phrases.to_vec(),
        });
        self
    }

    pub fn with_metadata_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.metadata_extractor = extractor;
        self
    }

    /// Result metadata for the chosen item
    pub fn extract_metadata(&self, item: &MediaItem) -> BTreeMap<String, Value> {
        (self.metadata_extractor)(item)
    }

    /// Source kind of a cross-kind request, if the message announces one
    pub fn detect_cross_kind(&self, message: &str) -> Option<MediaKind> {
        let text = normalize_message(message);
        self.cross_kind_sources
            .iter()
            .find(|source| contains_any(&text, &source.phrases))
            .map(|source| source.source)
    }
}

/// Kind -> config map composed at startup
#[derive(Debug, Clone)]
pub struct KindRegistry {
    configs: HashMap<MediaKind, KindConfig>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl KindRegistry {
    /// Registry with the built-in configuration for every kind
    pub fn new(config: &ResolverConfig) -> Self {
        let image = KindConfig::new(MediaKind::Image, &IMAGE_NOUNS, config)
            .with_edit_words(&[
                "background", "filter", "colorize", "upscale", "crop", "recolor", "фон",
                "фильтр", "раскрась", "обрежь",
            ])
            .with_style_words(&["brighter", "darker", "contrast", "ярче", "темнее", "контраст"])
            .with_cross_kind_source(
                MediaKind::Video,
                &["frame from", "screenshot from", "still from", "кадр из", "скриншот из"],
            )
            .with_metadata_extractor(image_metadata);

        let video = KindConfig::new(MediaKind::Video, &VIDEO_NOUNS, config)
            .with_edit_words(&[
                "trim", "cut ", "speed up", "slow down", "loop", "обрежь", "ускорь", "замедли",
                "зацикли",
            ])
            .with_style_words(&["fps", "frame rate", "cinematic", "кинематограф"])
            .with_cross_kind_source(
                MediaKind::Image,
                &[
                    "from this image", "from the image", "from this picture", "from this photo",
                    "animate", "bring it to life", "из этой картинки", "из картинки",
                    "из этого фото", "из фото", "из изображения", "оживи", "анимируй",
                ],
            )
            .with_metadata_extractor(timed_metadata);

        let audio = KindConfig::new(MediaKind::Audio, &AUDIO_NOUNS, config)
            .with_edit_words(&["louder", "quieter", "tempo", "pitch", "громче", "тише", "темп"])
            .with_style_words(&["genre", "mood", "жанр", "настроени"])
            .with_cross_kind_source(
                MediaKind::Video,
                &[
                    "from this video", "from the video", "soundtrack for", "extract the audio",
                    "из этого видео", "из видео", "озвучь видео", "музыку к видео",
                ],
            )
            .with_metadata_extractor(timed_metadata);

        let document = KindConfig::new(MediaKind::Document, &DOCUMENT_NOUNS, config)
            .with_edit_words(&[
                "summarize", "translate", "rewrite", "shorten", "перепиши", "переведи",
                "сократи", "перескажи",
            ])
            .with_style_words(&["formal", "tone", "формальн", "тон "])
            .with_cross_kind_source(
                MediaKind::Image,
                &[
                    "text from this image", "text from the image", "recognize text",
                    "текст с картинки", "текст с фото", "распознай текст",
                ],
            )
            .with_metadata_extractor(document_metadata);

        let mut registry = Self {
            configs: HashMap::new(),
        };
        for kind_config in [image, video, audio, document] {
            registry.insert(kind_config);
        }
        registry
    }

    /// Add or replace the config for its kind
    pub fn insert(&mut self, config: KindConfig) {
        self.configs.insert(config.kind, config);
    }

    pub fn get(&self, kind: MediaKind) -> Option<&KindConfig> {
        self.configs.get(&kind)
    }

    /// Source kind when a `target` request names an item of another kind
    pub fn detect_cross_kind(&self, target: MediaKind, message: &str) -> Option<MediaKind> {
        self.get(target)?.detect_cross_kind(message)
    }
}

fn no_metadata(_: &MediaItem) -> BTreeMap<String, Value> {
    BTreeMap::new()
}

fn copy_keys(item: &MediaItem, keys: &[&str]) -> BTreeMap<String, Value> {
    keys.iter()
        .filter_map(|key| item.metadata.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn image_metadata(item: &MediaItem) -> BTreeMap<String, Value> {
    copy_keys(item, &["width", "height", "name"])
}

fn timed_metadata(item: &MediaItem) -> BTreeMap<String, Value> {
    let mut out = copy_keys(item, &["name"]);
    let duration = item
        .metadata
        .get("durationSeconds")
        .or_else(|| item.metadata.get("duration"))
        .and_then(Value::as_f64);
    if let Some(seconds) = duration {
        out.insert("durationSeconds".to_string(), Value::from(seconds));
    }
    out
}

fn document_metadata(item: &MediaItem) -> BTreeMap<String, Value> {
    let mut out = copy_keys(item, &["name"]);
    if let Some(pages) = item
        .metadata
        .get("pageCount")
        .or_else(|| item.metadata.get("pages"))
        .and_then(Value::as_u64)
    {
        out.insert("pageCount".to_string(), Value::from(pages));
    }
    out
}
