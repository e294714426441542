//! Typed record tags.
//!
//! Records carry tags as positional string arrays on the wire. Internally
//! each tag kind gets its own variant so field meaning is carried by the
//! type, and the flat form is produced only at the event boundary.

/// A single record tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// `["d", value]`: deduplication coordinate for addressable records.
    Identifier(String),
    /// `["game", id]`
    Game(String),
    /// `["slug", slug]`
    Slug(String),
    /// `["title", title]`
    Title(String),
    /// `["summary", summary]`
    Summary(String),
    /// `["version", version]`
    Version(String),
    /// `["published-by", npub]`
    PublishedBy(String),
    /// `["relay", url]`, one per relay hint.
    Relay(String),
    /// `["link", rel, url]`
    Link { rel: &'static str, url: String },
    /// `["author", pubkey, role, displayName?, zapSplit?]`
    Author {
        pubkey: String,
        role: String,
        display_name: Option<String>,
        zap_split: Option<f64>,
    },
    /// `["category", name]`
    Category(String),
    /// `["t", label]`
    Topic(String),
    /// `["cw", warning]`
    ContentWarning(String),
    /// `["zap", lnurl]`
    ZapTarget(String),
    /// `["zap-bolt12", offer]`
    ZapBolt12(String),
    /// `["license", spdx]`
    License(String),
    /// `["depends", coordinate, versionRange]`
    Depends {
        coordinate: String,
        version_range: String,
    },
    /// `["distribution", uri]`
    Distribution(String),
    /// `["hash", "<algorithm>:<value>"]`
    ArtifactHash { algorithm: String, value: String },
    /// `["root-hash", "<algorithm>:<value>"]`
    RootHash { algorithm: String, value: String },
    /// `["game-version-range", range]`
    GameVersionRange(String),
    /// `["relays", url...]`, all hints spread over one tag.
    Relays(Vec<String>),
    /// `["amount", msat]`
    Amount(u64),
    /// `["lnurl", url]`
    Lnurl(String),
    /// `["description", sha256-hex]`
    DescriptionHash(String),
    /// `["p", pubkey]`
    Recipient(String),
    /// `["e", event-id]`
    EventRef(String),
    /// `["a", coordinate]`
    Address(String),
    /// `["zap-name", message]`
    ZapName(String),
    /// `["callback", url]`
    Callback(String),
    /// `["bolt11", invoice]`
    Bolt11(String),
}

impl Tag {
    /// Flatten to the positional wire form.
    pub fn into_wire(self) -> Vec<String> {
        match self {
            Tag::Identifier(v) => vec!["d".into(), v],
            Tag::Game(v) => vec!["game".into(), v],
            Tag::Slug(v) => vec!["slug".into(), v],
            Tag::Title(v) => vec!["title".into(), v],
            Tag::Summary(v) => vec!["summary".into(), v],
            Tag::Version(v) => vec!["version".into(), v],
            Tag::PublishedBy(v) => vec!["published-by".into(), v],
            Tag::Relay(v) => vec!["relay".into(), v],
            Tag::Link { rel, url } => vec!["link".into(), rel.into(), url],
            Tag::Author {
                pubkey,
                role,
                display_name,
                zap_split,
            } => {
                let mut tag = vec!["author".into(), pubkey, role];
                if let Some(name) = display_name {
                    tag.push(name);
                }
                if let Some(split) = zap_split {
                    tag.push(format!("{}", split));
                }
                tag
            }
            Tag::Category(v) => vec!["category".into(), v],
            Tag::Topic(v) => vec!["t".into(), v],
            Tag::ContentWarning(v) => vec!["cw".into(), v],
            Tag::ZapTarget(v) => vec!["zap".into(), v],
            Tag::ZapBolt12(v) => vec!["zap-bolt12".into(), v],
            Tag::License(v) => vec!["license".into(), v],
            Tag::Depends {
                coordinate,
                version_range,
            } => vec!["depends".into(), coordinate, version_range],
            Tag::Distribution(v) => vec!["distribution".into(), v],
            Tag::ArtifactHash { algorithm, value } => {
                vec!["hash".into(), format!("{}:{}", algorithm, value)]
            }
            Tag::RootHash { algorithm, value } => {
                vec!["root-hash".into(), format!("{}:{}", algorithm, value)]
            }
            Tag::GameVersionRange(v) => vec!["game-version-range".into(), v],
            Tag::Relays(urls) => {
                let mut tag = vec!["relays".to_string()];
                tag.extend(urls);
                tag
            }
            Tag::Amount(msat) => vec!["amount".into(), msat.to_string()],
            Tag::Lnurl(v) => vec!["lnurl".into(), v],
            Tag::DescriptionHash(v) => vec!["description".into(), v],
            Tag::Recipient(v) => vec!["p".into(), v],
            Tag::EventRef(v) => vec!["e".into(), v],
            Tag::Address(v) => vec!["a".into(), v],
            Tag::ZapName(v) => vec!["zap-name".into(), v],
            Tag::Callback(v) => vec!["callback".into(), v],
            Tag::Bolt11(v) => vec!["bolt11".into(), v],
        }
    }
}

/// Flatten an ordered tag list to the wire form, preserving order.
pub fn to_wire(tags: Vec<Tag>) -> Vec<Vec<String>> {
    tags.into_iter().map(Tag::into_wire).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_tag_trailing_fields_are_optional() {
        let bare = Tag::Author {
            pubkey: "npub1abc".into(),
            role: "maintainer".into(),
            display_name: None,
            zap_split: None,
        };
        assert_eq!(bare.into_wire(), vec!["author", "npub1abc", "maintainer"]);

        let full = Tag::Author {
            pubkey: "npub1abc".into(),
            role: "artist".into(),
            display_name: Some("Ada".into()),
            zap_split: Some(0.25),
        };
        assert_eq!(
            full.into_wire(),
            vec!["author", "npub1abc", "artist", "Ada", "0.25"]
        );
    }

    #[test]
    fn whole_zap_splits_render_without_decimal_point() {
        let tag = Tag::Author {
            pubkey: "npub1abc".into(),
            role: "maintainer".into(),
            display_name: None,
            zap_split: Some(1.0),
        };
        assert_eq!(tag.into_wire()[3], "1");
    }

    #[test]
    fn relays_tag_spreads_hints() {
        let tag = Tag::Relays(vec![
            "wss://relay.damus.io".into(),
            "wss://nos.lol".into(),
        ]);
        assert_eq!(
            tag.into_wire(),
            vec!["relays", "wss://relay.damus.io", "wss://nos.lol"]
        );
    }

    #[test]
    fn hash_tags_join_algorithm_and_value() {
        let tag = Tag::ArtifactHash {
            algorithm: "sha256".into(),
            value: "deadbeef".into(),
        };
        assert_eq!(tag.into_wire(), vec!["hash", "sha256:deadbeef"]);

        let root = Tag::RootHash {
            algorithm: "blake3".into(),
            value: "cafe".into(),
        };
        assert_eq!(root.into_wire(), vec!["root-hash", "blake3:cafe"]);
    }

    #[test]
    fn to_wire_preserves_order() {
        let tags = vec![
            Tag::Identifier("factorio.krastorio".into()),
            Tag::Game("factorio".into()),
            Tag::Slug("krastorio".into()),
        ];
        let wire = to_wire(tags);
        assert_eq!(wire[0][0], "d");
        assert_eq!(wire[1][0], "game");
        assert_eq!(wire[2][0], "slug");
    }
}
