//! Main-stage media dispatch.
//!
//! Classic entries describe their main stage with a kind tag and a payload
//! whose shape depends entirely on the tag. [`dispatch`] closes that over a
//! fixed set of kinds: each tag gets its own payload type and its own node
//! and thumbnail rules, and anything else is rejected.

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geo::{Extent, normalize_web_mercator};
use crate::legacy::RawMedia;
use crate::model::{
    ContentNode, EmbedNode, ImageNode, LayerVisibility, MapConfig, MapExport, MapNode,
    ThumbnailRef, VideoNode,
};
use crate::util::{non_empty, upgrade_https};

/// Width of a map-export thumbnail in pixels.
pub const THUMBNAIL_WIDTH: u32 = 800;
/// Height of a map-export thumbnail in pixels.
pub const THUMBNAIL_HEIGHT: u32 = 600;
/// Resolution of a map-export thumbnail.
pub const THUMBNAIL_DPI: u32 = 96;

/// Supported main-stage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Webmap,
    Image,
    Webpage,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Webmap,
        MediaKind::Image,
        MediaKind::Webpage,
        MediaKind::Video,
    ];

    /// Look up a kind by its classic tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "webmap" => Ok(MediaKind::Webmap),
            "image" => Ok(MediaKind::Image),
            "webpage" => Ok(MediaKind::Webpage),
            "video" => Ok(MediaKind::Video),
            other => Err(Error::UnsupportedMediaKind(other.to_string())),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Webmap => "webmap",
            MediaKind::Image => "image",
            MediaKind::Webpage => "webpage",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classic `webmap` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebmapPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub layers: Option<Vec<LayerPayload>>,
    #[serde(default)]
    pub operational_layers: Option<Vec<LayerPayload>>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Per-layer visibility in a classic webmap payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerPayload {
    pub id: String,
    #[serde(default = "visible_by_default", alias = "visible")]
    pub visibility: bool,
}

fn visible_by_default() -> bool {
    true
}

/// Classic `image` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Classic `webpage` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebpagePayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// Classic `video` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// Result of dispatching a main-stage descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub kind: MediaKind,
    pub node: ContentNode,
    pub thumbnail: ThumbnailRef,
}

/// Turn a classic main-stage descriptor into a content node and thumbnail.
pub fn dispatch(media: &RawMedia) -> Result<Dispatched> {
    let kind = MediaKind::from_tag(media.tag())?;
    let (node, thumbnail) = match kind {
        MediaKind::Webmap => webmap(parse_payload(kind, &media.payload)?)?,
        MediaKind::Image => image(parse_payload(kind, &media.payload)?)?,
        MediaKind::Webpage => webpage(parse_payload(kind, &media.payload)?)?,
        MediaKind::Video => video(parse_payload(kind, &media.payload)?)?,
    };
    Ok(Dispatched {
        kind,
        node,
        thumbnail,
    })
}

fn parse_payload<T: DeserializeOwned + Default>(kind: MediaKind, payload: &Value) -> Result<T> {
    if payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(payload.clone()).map_err(|e| Error::InvalidMedia {
        kind: kind.tag(),
        reason: e.to_string(),
    })
}

fn required(kind: MediaKind, field: &str, value: Option<&str>) -> Result<String> {
    non_empty(value).ok_or_else(|| Error::InvalidMedia {
        kind: kind.tag(),
        reason: format!("missing {field}"),
    })
}

fn webmap(payload: WebmapPayload) -> Result<(ContentNode, ThumbnailRef)> {
    let id = required(MediaKind::Webmap, "webmap id", payload.id.as_deref())?;

    let layers = payload
        .layers
        .or(payload.operational_layers)
        .unwrap_or_default()
        .into_iter()
        .map(|l| LayerVisibility {
            id: l.id,
            visible: l.visibility,
        })
        .collect();

    let thumbnail = ThumbnailRef::MapExport(MapExport {
        webmap_id: id.clone(),
        extent: payload
            .extent
            .as_ref()
            .map(normalize_web_mercator)
            .unwrap_or_else(Extent::world),
        width: THUMBNAIL_WIDTH,
        height: THUMBNAIL_HEIGHT,
        dpi: THUMBNAIL_DPI,
    });

    let mut map = MapNode::new(id).with_deferred(MapConfig {
        viewpoint: payload.extent,
        layers,
    });
    map.alt = non_empty(payload.alt_text.as_deref());
    map.caption = non_empty(payload.caption.as_deref());

    Ok((ContentNode::Map(map), thumbnail))
}

fn image(payload: ImagePayload) -> Result<(ContentNode, ThumbnailRef)> {
    let url = upgrade_https(&required(MediaKind::Image, "image url", payload.url.as_deref())?);
    let node = ImageNode {
        src: url.clone(),
        alt: non_empty(payload.alt_text.as_deref()).or_else(|| non_empty(payload.title.as_deref())),
        caption: non_empty(payload.caption.as_deref()),
        link: non_empty(payload.link.as_deref()),
    };
    Ok((ContentNode::Image(node), ThumbnailRef::Url { url }))
}

fn webpage(payload: WebpagePayload) -> Result<(ContentNode, ThumbnailRef)> {
    let url = required(MediaKind::Webpage, "webpage url", payload.url.as_deref())?;
    let node = EmbedNode {
        url: upgrade_https(&url),
        alt: non_empty(payload.alt_text.as_deref()),
        caption: non_empty(payload.caption.as_deref()),
    };
    Ok((ContentNode::Embed(node), ThumbnailRef::Default))
}

fn video(payload: VideoPayload) -> Result<(ContentNode, ThumbnailRef)> {
    let url = required(MediaKind::Video, "video url", payload.url.as_deref())?;
    let node = VideoNode {
        src: upgrade_https(&url),
        alt: non_empty(payload.alt_text.as_deref()),
        caption: non_empty(payload.caption.as_deref()),
    };
    Ok((ContentNode::Video(node), ThumbnailRef::Default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::WEB_MERCATOR_HALF_WORLD;
    use serde_json::json;

    #[test]
    fn test_every_kind_dispatches() {
        let payloads = [
            json!({"id": "abc"}),
            json!({"url": "http://x/a.png"}),
            json!({"url": "https://x"}),
            json!({"url": "https://youtu.be/x"}),
        ];
        for (kind, payload) in MediaKind::ALL.into_iter().zip(payloads) {
            let media = RawMedia::new(kind.tag(), payload);
            let out = dispatch(&media).unwrap();
            assert_eq!(out.kind, kind);
            assert_eq!(MediaKind::from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unsupported_kinds() {
        for tag in ["", "Webmap", "audio", "storymap"] {
            let media = RawMedia::new(tag, json!({"url": "https://x"}));
            assert!(matches!(dispatch(&media), Err(Error::UnsupportedMediaKind(t)) if t == tag));
        }
        assert!(matches!(
            dispatch(&RawMedia::default()),
            Err(Error::UnsupportedMediaKind(t)) if t.is_empty()
        ));
    }

    #[test]
    fn test_missing_reference_is_invalid() {
        for kind in MediaKind::ALL {
            let media = RawMedia::new(kind.tag(), Value::Null);
            assert!(matches!(
                dispatch(&media),
                Err(Error::InvalidMedia { kind: k, .. }) if k == kind.tag()
            ));
        }
        let blank = RawMedia::new("webmap", json!({"id": "  "}));
        assert!(matches!(dispatch(&blank), Err(Error::InvalidMedia { .. })));
    }

    #[test]
    fn test_malformed_payload_is_invalid() {
        let media = RawMedia::new("webmap", json!({"id": "a", "extent": {"xmin": "west"}}));
        assert!(matches!(dispatch(&media), Err(Error::InvalidMedia { .. })));
    }

    #[test]
    fn test_webmap_defers_extent_and_layers() {
        let media = RawMedia::new(
            "webmap",
            json!({
                "id": "m1",
                "extent": {"xmin": 0, "ymin": 0, "xmax": 10, "ymax": 10},
                "layers": [{"id": "roads", "visibility": false}, {"id": "rivers"}]
            }),
        );
        let out = dispatch(&media).unwrap();
        let map = out.node.as_map().unwrap();
        assert_eq!(map.item_id, "m1");
        assert!(map.viewpoint.is_none());
        let deferred = map.deferred().unwrap();
        assert_eq!(deferred.viewpoint, Some(Extent::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(deferred.layers.len(), 2);
        assert!(!deferred.layers[0].visible);
        assert!(deferred.layers[1].visible);

        let ThumbnailRef::MapExport(export) = out.thumbnail else {
            panic!("expected map export thumbnail");
        };
        assert_eq!(export.webmap_id, "m1");
        assert_eq!((export.width, export.height, export.dpi), (800, 600, 96));
    }

    #[test]
    fn test_webmap_operational_layers_fallback() {
        let media = RawMedia::new(
            "webmap",
            json!({"id": "m1", "operationalLayers": [{"id": "a", "visible": false}]}),
        );
        let out = dispatch(&media).unwrap();
        let layers = &out.node.as_map().unwrap().deferred().unwrap().layers;
        assert_eq!(layers[0].id, "a");
        assert!(!layers[0].visible);
    }

    #[test]
    fn test_webmap_thumbnail_without_extent_is_world() {
        let out = dispatch(&RawMedia::new("webmap", json!({"id": "m1"}))).unwrap();
        assert!(out.node.as_map().unwrap().is_configured());
        match out.thumbnail {
            ThumbnailRef::MapExport(export) => assert_eq!(export.extent, Extent::world()),
            other => panic!("unexpected thumbnail {other:?}"),
        }
    }

    #[test]
    fn test_webmap_thumbnail_is_normalized() {
        let media = RawMedia::new(
            "webmap",
            json!({"id": "m1", "extent": {
                "xmin": -25000000.0, "ymin": -30000000.0,
                "xmax": 1000.0, "ymax": 1000.0
            }}),
        );
        let out = dispatch(&media).unwrap();
        let ThumbnailRef::MapExport(export) = out.thumbnail else {
            panic!("expected map export thumbnail");
        };
        assert!(export.extent.xmin >= -WEB_MERCATOR_HALF_WORLD);
        assert_eq!(export.extent.ymin, -WEB_MERCATOR_HALF_WORLD);
        // The node keeps the authored extent.
        let deferred = out.node.as_map().unwrap().deferred().unwrap();
        assert_eq!(deferred.viewpoint.unwrap().xmin, -25000000.0);
    }

    #[test]
    fn test_webmap_huge_extent_is_wrapped() {
        let media = RawMedia::new(
            "webmap",
            json!({"id": "m1", "extent": {
                "xmin": 1e300, "ymin": 0, "xmax": 1e300, "ymax": 10
            }}),
        );
        let out = dispatch(&media).unwrap();
        let ThumbnailRef::MapExport(export) = out.thumbnail else {
            panic!("expected map export thumbnail");
        };
        assert!(export.extent.xmin.abs() <= WEB_MERCATOR_HALF_WORLD);
        assert!(export.extent.xmax.abs() <= WEB_MERCATOR_HALF_WORLD);
    }

    #[test]
    fn test_image_upgrades_and_carries_metadata() {
        let media = RawMedia::new(
            "image",
            json!({
                "url": "http://x/nile.jpg",
                "title": "The Nile",
                "caption": "Delta",
                "link": "https://nile.example"
            }),
        );
        let out = dispatch(&media).unwrap();
        let img = out.node.as_image().unwrap();
        assert_eq!(img.src, "https://x/nile.jpg");
        assert_eq!(img.alt.as_deref(), Some("The Nile"));
        assert_eq!(img.caption.as_deref(), Some("Delta"));
        assert_eq!(img.link.as_deref(), Some("https://nile.example"));
        assert_eq!(
            out.thumbnail,
            ThumbnailRef::Url {
                url: "https://x/nile.jpg".into()
            }
        );
    }

    #[test]
    fn test_webpage_and_video() {
        let page = dispatch(&RawMedia::new("webpage", json!({"url": "http://a.b/"}))).unwrap();
        assert!(matches!(&page.node, ContentNode::Embed(e) if e.url == "https://a.b/"));
        assert_eq!(page.thumbnail, ThumbnailRef::Default);

        let vid = dispatch(&RawMedia::new("video", json!({"url": "https://v/1"}))).unwrap();
        assert!(matches!(&vid.node, ContentNode::Video(v) if v.src == "https://v/1"));
        assert_eq!(vid.thumbnail, ThumbnailRef::Default);
    }

    #[test]
    fn test_dispatch_does_not_mutate_descriptor() {
        let media = RawMedia::new("image", json!({"url": "http://x/a.png"}));
        let before = media.clone();
        dispatch(&media).unwrap();
        assert_eq!(media, before);
    }
}
