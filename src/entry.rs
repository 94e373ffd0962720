//! Building one story per classic entry.
//!
//! [`EntryBuild`] is a typestate machine: each stage is a distinct type and
//! each transition consumes the previous stage, so the steps can only run
//! in order:
//!
//! ```text
//! Empty -> MediaResolved -> ContentResolved -> Assembled
//!       -> Attached -> Configured -> CoverPatched
//! ```
//!
//! In particular a map's viewpoint and layer overrides are applied in
//! `Attached -> Configured`, after the map has joined a slide.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tabula::config::ConvertOptions;
//! use tabula::entry::build_entry;
//! use tabula::legacy::{LegacyEntry, RawMedia};
//! use tabula::theme::Theme;
//!
//! let entry = LegacyEntry {
//!     title: "Nile".into(),
//!     media: RawMedia::new("image", json!({"url": "https://x/nile.jpg"})),
//!     description: "<p>The longest river.</p>".into(),
//!     hidden: false,
//! };
//! let built = build_entry(0, &entry, Theme::Summit, &ConvertOptions::default()).unwrap();
//! assert!(built.document.is_cover_hidden());
//! ```

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::ConvertOptions;
use crate::error::{EntryBuildFailure, Error};
use crate::legacy::LegacyEntry;
use crate::markup::{self, MarkupOutput, RecoveryWarning};
use crate::media::{self, Dispatched};
use crate::model::{
    Cover, NodeId, SlideRef, Story, TargetDocument, ThumbnailRef, hide_cover,
};
use crate::theme::Theme;

/// Stage an entry was in when its build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
    ResolvingMedia,
    ResolvingContent,
    Assembling,
    Attaching,
    Configuring,
    PatchingCover,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::ResolvingMedia => "resolving media",
            BuildStage::ResolvingContent => "resolving content",
            BuildStage::Assembling => "assembling",
            BuildStage::Attaching => "attaching",
            BuildStage::Configuring => "configuring",
            BuildStage::PatchingCover => "patching cover",
        })
    }
}

// ============================================================================
// Stages
// ============================================================================

pub struct Empty;

pub struct MediaResolved {
    media: Dispatched,
}

pub struct ContentResolved {
    media: Dispatched,
    panel: MarkupOutput,
}

pub struct Assembled {
    story: Story,
    media: NodeId,
    panel: Vec<NodeId>,
    thumbnail: ThumbnailRef,
    warnings: Vec<RecoveryWarning>,
}

pub struct Attached {
    story: Story,
    slide: SlideRef,
    thumbnail: ThumbnailRef,
    warnings: Vec<RecoveryWarning>,
}

pub struct Configured {
    story: Story,
    thumbnail: ThumbnailRef,
    warnings: Vec<RecoveryWarning>,
}

pub struct CoverPatched {
    document: TargetDocument,
    warnings: Vec<RecoveryWarning>,
}

/// A story being built from one classic entry.
pub struct EntryBuild<'a, S> {
    index: usize,
    entry: &'a LegacyEntry,
    theme: Theme,
    options: &'a ConvertOptions,
    state: S,
}

/// A finished entry.
#[derive(Debug, Clone)]
pub struct BuiltEntry {
    pub document: TargetDocument,
    /// Side panel content that could not be carried over.
    pub warnings: Vec<RecoveryWarning>,
}

impl<'a, S> EntryBuild<'a, S> {
    fn advance<T>(self, state: T) -> EntryBuild<'a, T> {
        EntryBuild {
            index: self.index,
            entry: self.entry,
            theme: self.theme,
            options: self.options,
            state,
        }
    }

    fn fail(&self, stage: BuildStage, source: Error) -> EntryBuildFailure {
        EntryBuildFailure {
            index: self.index,
            title: self.entry.title.clone(),
            stage,
            source,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Title of the story, falling back to the entry position.
    pub fn title(&self) -> String {
        if self.entry.title.is_empty() {
            format!("Entry {}", self.index + 1)
        } else {
            self.entry.title.clone()
        }
    }
}

impl<'a> EntryBuild<'a, Empty> {
    pub fn new(
        index: usize,
        entry: &'a LegacyEntry,
        theme: Theme,
        options: &'a ConvertOptions,
    ) -> Self {
        Self {
            index,
            entry,
            theme,
            options,
            state: Empty,
        }
    }

    /// Dispatch the main-stage descriptor.
    pub fn resolve_media(self) -> Result<EntryBuild<'a, MediaResolved>, EntryBuildFailure> {
        let media = media::dispatch(&self.entry.media)
            .map_err(|e| self.fail(BuildStage::ResolvingMedia, e))?;
        debug!(index = self.index, kind = %media.kind, "media resolved");
        Ok(self.advance(MediaResolved { media }))
    }
}

impl<'a> EntryBuild<'a, MediaResolved> {
    /// Transform the side panel HTML.
    pub fn resolve_content(self) -> EntryBuild<'a, ContentResolved> {
        let panel = markup::transform(&self.entry.description);
        debug!(
            index = self.index,
            nodes = panel.nodes.len(),
            warnings = panel.warnings.len(),
            "side panel transformed"
        );
        let MediaResolved { media } = self.state;
        EntryBuild {
            index: self.index,
            entry: self.entry,
            theme: self.theme,
            options: self.options,
            state: ContentResolved { media, panel },
        }
    }
}

impl<'a> EntryBuild<'a, ContentResolved> {
    /// Create the story shell and allocate every content node, detached.
    pub fn assemble(self) -> EntryBuild<'a, Assembled> {
        let ContentResolved { media, panel } = self.state;
        let mut story = Story::new(self.theme, self.options.panel_style.clone());

        let media_id = story.alloc(media.node);
        let panel_ids = panel.nodes.into_iter().map(|n| story.alloc(n)).collect();

        EntryBuild {
            index: self.index,
            entry: self.entry,
            theme: self.theme,
            options: self.options,
            state: Assembled {
                story,
                media: media_id,
                panel: panel_ids,
                thumbnail: media.thumbnail,
                warnings: panel.warnings,
            },
        }
    }
}

impl<'a> EntryBuild<'a, Assembled> {
    /// The story as assembled, before anything is attached.
    pub fn story(&self) -> &Story {
        &self.state.story
    }

    /// Place the main-stage node and the side panel on a new slide.
    pub fn attach(self) -> Result<EntryBuild<'a, Attached>, EntryBuildFailure> {
        let index = self.index;
        let entry = self.entry;
        let Assembled {
            mut story,
            media,
            panel,
            thumbnail,
            warnings,
        } = self.state;
        let slide = story
            .add_slide(media, &panel)
            .map_err(|source| EntryBuildFailure {
                index,
                title: entry.title.clone(),
                stage: BuildStage::Attaching,
                source,
            })?;
        Ok(EntryBuild {
            index,
            entry,
            theme: self.theme,
            options: self.options,
            state: Attached {
                story,
                slide,
                thumbnail,
                warnings,
            },
        })
    }
}

impl<'a> EntryBuild<'a, Attached> {
    pub fn story(&self) -> &Story {
        &self.state.story
    }

    pub fn slide(&self) -> SlideRef {
        self.state.slide
    }

    /// Apply deferred map configuration now that every map is attached.
    ///
    /// The main-stage map goes first; maps embedded in the side panel
    /// follow in document order.
    pub fn configure(mut self) -> Result<EntryBuild<'a, Configured>, EntryBuildFailure> {
        let main = self.state.slide.media;
        let mut pending = self.state.story.pending_maps();
        pending.sort_by_key(|&id| id != main);

        for id in pending {
            if let Err(e) = self.state.story.configure_map(id) {
                return Err(self.fail(BuildStage::Configuring, e));
            }
            debug!(index = self.index, node = id.0, "map configured");
        }

        let Attached {
            story,
            thumbnail,
            warnings,
            ..
        } = self.state;
        Ok(EntryBuild {
            index: self.index,
            entry: self.entry,
            theme: self.theme,
            options: self.options,
            state: Configured {
                story,
                thumbnail,
                warnings,
            },
        })
    }
}

impl<'a> EntryBuild<'a, Configured> {
    pub fn story(&self) -> &Story {
        &self.state.story
    }

    /// Fill in the cover, serialize the story and hide its cover.
    pub fn patch_cover(mut self) -> Result<EntryBuild<'a, CoverPatched>, EntryBuildFailure> {
        let title = self.title();
        self.state.story.set_cover(Cover {
            title: title.clone(),
            byline: self.options.cover_byline.clone(),
            date: self.options.cover_date.clone(),
            thumbnail: Some(self.state.thumbnail.clone()),
        });

        let mut nodes = match self.state.story.to_node_map() {
            Ok(nodes) => nodes,
            Err(e) => return Err(self.fail(BuildStage::PatchingCover, e)),
        };
        hide_cover(&mut nodes);

        let document = TargetDocument {
            title,
            theme: self.theme,
            thumbnail: self.state.thumbnail.clone(),
            tags: self.options.tags.clone(),
            root: NodeId::ROOT.key(),
            nodes,
        };
        let warnings = std::mem::take(&mut self.state.warnings);
        Ok(self.advance(CoverPatched { document, warnings }))
    }
}

impl EntryBuild<'_, CoverPatched> {
    pub fn document(&self) -> &TargetDocument {
        &self.state.document
    }

    pub fn finish(self) -> BuiltEntry {
        BuiltEntry {
            document: self.state.document,
            warnings: self.state.warnings,
        }
    }
}

/// Run every stage for one entry.
pub fn build_entry(
    index: usize,
    entry: &LegacyEntry,
    theme: Theme,
    options: &ConvertOptions,
) -> Result<BuiltEntry, EntryBuildFailure> {
    let built = EntryBuild::new(index, entry, theme, options)
        .resolve_media()?
        .resolve_content()
        .assemble()
        .attach()?
        .configure()?
        .patch_cover()?
        .finish();
    for warning in &built.warnings {
        tracing::warn!(index, title = %built.document.title, %warning, "side panel content dropped");
    }
    Ok(built)
}
