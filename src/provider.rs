//! Wire model of the provider's profile and post endpoints.
//!
//! Only the fields the client reads are modeled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Deserializer, Serialize};

pub const LANDING_URL: &str = "https://www.instagram.com/";
pub const LOGOUT_URL: &str = "https://www.instagram.com/accounts/logout";

const APP_ID_HEADER: (&str, &str) = ("x-ig-app-id", "936619743392459");

/// Which profile endpoint to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// `web_profile_info` API, requires the app id header
    #[default]
    Api,
    /// `?__a=1` JSON view of the profile page
    Legacy,
}

impl Endpoint {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "api" => Some(Self::Api),
            "legacy" | "web" => Some(Self::Legacy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Legacy => "legacy",
        }
    }

    pub fn user_url(&self, username: &str) -> String {
        match self {
            Self::Api => format!(
                "https://i.instagram.com/api/v1/users/web_profile_info/?username={}",
                username
            ),
            Self::Legacy => format!("https://www.instagram.com/{}/?__a=1&__d=dis", username),
        }
    }

    /// Headers required by the endpoint besides the cookie
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::Api => vec![APP_ID_HEADER],
            Self::Legacy => Vec::new(),
        }
    }

    /// Extract the user object. `None` for empty, unparseable, or null users.
    pub fn parse_user(&self, body: &[u8]) -> Option<User> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        match self {
            Self::Api => serde_json::from_slice::<ApiEnvelope>(body)
                .ok()?
                .data?
                .user,
            Self::Legacy => serde_json::from_slice::<GraphqlEnvelope>(body)
                .ok()?
                .graphql?
                .user,
        }
    }
}

pub fn post_detail_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{}/?__a=1&__d=dis", shortcode)
}

/// Extract the media object from a post detail response
pub fn parse_post_detail(body: &[u8]) -> Option<MediaNode> {
    serde_json::from_slice::<GraphqlEnvelope>(body)
        .ok()?
        .graphql?
        .shortcode_media
}

/// Feeds send `null` for counters and flags they do not fill in
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    graphql: Option<GraphqlData>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    shortcode_media: Option<MediaNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followed_by_viewer: bool,
    #[serde(default)]
    edge_owner_to_timeline_media: Option<Edges<MediaNode>>,
}

impl User {
    /// Private accounts are readable only by followers
    pub fn is_accessible(&self) -> bool {
        !self.is_private || self.followed_by_viewer
    }

    /// Recent posts, newest first
    pub fn recent_media(&self) -> Vec<&MediaNode> {
        self.edge_owner_to_timeline_media
            .as_ref()
            .map(|e| e.nodes())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edges<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

impl<T> Edges<T> {
    fn nodes(&self) -> Vec<&T> {
        self.edges.iter().map(|e| &e.node).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Count {
    #[serde(default, deserialize_with = "null_as_default")]
    count: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Dimensions {
    #[serde(default, deserialize_with = "null_as_default")]
    width: u32,
}

/// One rendition of an image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub src: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config_width: u32,
}

/// A (width, url) pair the client can choose from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub width: u32,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub shortcode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_video: bool,
    #[serde(default)]
    display_url: Option<String>,
    #[serde(default)]
    dimensions: Option<Dimensions>,
    #[serde(default)]
    display_resources: Option<Vec<Resource>>,
    #[serde(default)]
    thumbnail_resources: Option<Vec<Resource>>,
    #[serde(default)]
    edge_sidecar_to_children: Option<Edges<MediaNode>>,
    // Feeds carry either or both of each counter pair
    #[serde(default)]
    edge_liked_by: Option<Count>,
    #[serde(default)]
    edge_media_preview_like: Option<Count>,
    #[serde(default)]
    edge_media_to_comment: Option<Count>,
    #[serde(default)]
    edge_media_preview_comment: Option<Count>,
}

impl MediaNode {
    /// Children of a carousel post; empty for single-media posts
    pub fn carousel_children(&self) -> Vec<&MediaNode> {
        self.edge_sidecar_to_children
            .as_ref()
            .map(|e| e.nodes())
            .unwrap_or_default()
    }

    pub fn likes(&self) -> u64 {
        self.edge_liked_by
            .as_ref()
            .or(self.edge_media_preview_like.as_ref())
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn comments(&self) -> u64 {
        self.edge_media_to_comment
            .as_ref()
            .or(self.edge_media_preview_comment.as_ref())
            .map(|c| c.count)
            .unwrap_or(0)
    }

    /// All renditions offered for this media, each URL once
    pub fn candidates(&self) -> Vec<Candidate> {
        let resources = self
            .display_resources
            .iter()
            .chain(self.thumbnail_resources.iter())
            .flatten()
            .map(|r| (r.config_width, &r.src));
        let display = match (&self.display_url, &self.dimensions) {
            (Some(url), Some(dim)) => Some((dim.width, url)),
            _ => None,
        };

        let mut out: Vec<Candidate> = Vec::new();
        for (width, url) in resources.chain(display) {
            if url.is_empty() || out.iter().any(|c| &c.url == url) {
                continue;
            }
            out.push(Candidate {
                width,
                url: url.clone(),
            });
        }
        out
    }
}

/// Widest candidate; ties resolve to the first maximal one
pub fn widest(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .reduce(|best, c| if c.width > best.width { c } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_json() -> serde_json::Value {
        json!({
            "id": "1",
            "shortcode": "ABC",
            "is_video": false,
            "display_url": "https://cdn.example/full_n.jpg",
            "dimensions": { "width": 1080, "height": 1350 },
            "thumbnail_resources": [
                { "src": "https://cdn.example/t150_n.jpg", "config_width": 150, "config_height": 150 },
                { "src": "https://cdn.example/t640_n.jpg", "config_width": 640, "config_height": 640 }
            ],
            "edge_liked_by": { "count": 12345 },
            "edge_media_preview_like": { "count": 12345 },
            "edge_media_to_comment": { "count": 67 }
        })
    }

    #[test]
    fn test_parse_api_user() {
        let body = json!({
            "data": { "user": {
                "username": "natgeo",
                "is_private": false,
                "followed_by_viewer": false,
                "edge_owner_to_timeline_media": { "count": 1, "edges": [ { "node": node_json() } ] }
            }},
            "status": "ok"
        });
        let user = Endpoint::Api
            .parse_user(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(user.username, "natgeo");
        assert!(user.is_accessible());
        let media = user.recent_media();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].likes(), 12345);
        assert_eq!(media[0].comments(), 67);
    }

    #[test]
    fn test_parse_legacy_user() {
        let body = json!({ "graphql": { "user": {
            "username": "private_one",
            "is_private": true,
            "followed_by_viewer": false,
            "edge_owner_to_timeline_media": { "count": 10, "edges": [] }
        }}});
        let user = Endpoint::Legacy
            .parse_user(body.to_string().as_bytes())
            .unwrap();
        assert!(!user.is_accessible());
        assert!(user.recent_media().is_empty());
    }

    #[test]
    fn test_parse_user_missing() {
        assert!(Endpoint::Api.parse_user(b"").is_none());
        assert!(Endpoint::Api.parse_user(b"{}").is_none());
        assert!(Endpoint::Api.parse_user(b"<html>").is_none());
        assert!(Endpoint::Api
            .parse_user(br#"{"data":{"user":null}}"#)
            .is_none());
        // wrong envelope for the variant
        assert!(Endpoint::Legacy
            .parse_user(br#"{"data":{"user":{"username":"x"}}}"#)
            .is_none());
    }

    #[test]
    fn test_candidates_include_display_url() {
        let node: MediaNode = serde_json::from_value(node_json()).unwrap();
        let candidates = node.candidates();
        assert_eq!(candidates.len(), 3);
        let best = widest(&candidates).unwrap();
        assert_eq!(best.width, 1080);
        assert_eq!(best.url, "https://cdn.example/full_n.jpg");
    }

    #[test]
    fn test_candidates_span_display_and_thumbnails() {
        let node: MediaNode = serde_json::from_value(json!({
            "shortcode": "X",
            "display_url": "https://cdn.example/d640.jpg",
            "dimensions": { "width": 640 },
            "display_resources": [
                { "src": "https://cdn.example/d320.jpg", "config_width": 320 },
                { "src": "https://cdn.example/d640.jpg", "config_width": 640 }
            ],
            "thumbnail_resources": [
                { "src": "https://cdn.example/t150.jpg", "config_width": 150 },
                { "src": "https://cdn.example/t750.jpg", "config_width": 750 }
            ]
        }))
        .unwrap();
        let candidates = node.candidates();
        assert_eq!(candidates.len(), 4);
        assert_eq!(widest(&candidates).unwrap().url, "https://cdn.example/t750.jpg");
    }

    #[test]
    fn test_one_odd_node_keeps_profile_readable() {
        let body = json!({ "data": { "user": {
            "username": "natgeo",
            "is_private": null,
            "edge_owner_to_timeline_media": { "edges": [
                { "node": node_json() },
                { "node": {
                    "shortcode": "B",
                    "is_video": null,
                    "edge_liked_by": { "count": null },
                    "dimensions": { "width": null },
                    "display_resources": [
                        { "src": "https://cdn.example/b_nowidth.jpg" },
                        { "src": null, "config_width": 1080 }
                    ]
                } }
            ] }
        }}});
        let user = Endpoint::Api
            .parse_user(body.to_string().as_bytes())
            .unwrap();
        assert!(user.is_accessible());

        let media = user.recent_media();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].likes(), 12345);
        assert_eq!(media[1].likes(), 0);
        assert!(!media[1].is_video);
        assert_eq!(
            media[1].candidates(),
            vec![Candidate {
                width: 0,
                url: "https://cdn.example/b_nowidth.jpg".to_string()
            }]
        );
    }

    #[test]
    fn test_null_fields_tolerated() {
        let node: MediaNode = serde_json::from_value(json!({
            "shortcode": "X",
            "display_url": null,
            "display_resources": null,
            "edge_sidecar_to_children": null
        }))
        .unwrap();
        assert!(node.candidates().is_empty());
        assert!(node.carousel_children().is_empty());
        assert_eq!(node.likes(), 0);
    }

    #[test]
    fn test_carousel_children() {
        let node: MediaNode = serde_json::from_value(json!({
            "shortcode": "C",
            "edge_sidecar_to_children": { "edges": [
                { "node": { "id": "c1", "display_resources": [ { "src": "https://cdn.example/c1.jpg", "config_width": 1080 } ] } },
                { "node": { "id": "c2", "is_video": true, "display_resources": [ { "src": "https://cdn.example/c2.jpg", "config_width": 720 } ] } }
            ]}
        }))
        .unwrap();
        let children = node.carousel_children();
        assert_eq!(children.len(), 2);
        assert!(children[1].is_video);
    }

    #[test]
    fn test_widest_ties_and_empty() {
        assert!(widest(&[]).is_none());
        let tied = vec![
            Candidate { width: 640, url: "a".into() },
            Candidate { width: 1080, url: "b".into() },
            Candidate { width: 1080, url: "c".into() },
        ];
        let best = widest(&tied).unwrap();
        assert_eq!(best.width, 1080);
    }

    #[test]
    fn test_parse_post_detail() {
        let body = json!({ "graphql": { "shortcode_media": node_json() } });
        let media = parse_post_detail(body.to_string().as_bytes()).unwrap();
        assert_eq!(media.shortcode, "ABC");
        assert!(parse_post_detail(b"{}").is_none());
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            Endpoint::Api.user_url("natgeo"),
            "https://i.instagram.com/api/v1/users/web_profile_info/?username=natgeo"
        );
        assert_eq!(Endpoint::Api.headers(), vec![APP_ID_HEADER]);
        assert!(Endpoint::Legacy.headers().is_empty());
        assert_eq!(Endpoint::from_str("LEGACY"), Some(Endpoint::Legacy));
        assert_eq!(Endpoint::from_str("nope"), None);
    }
}
