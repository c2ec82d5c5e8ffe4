// ─── Launch URIs ───
// Browser launches hand the player a `roblox-player:1key=value;...` URI.

use tracing::{debug, warn};

use super::deployment::normalize_channel;

pub const PLAYER_URI_SCHEME: &str = "roblox-player:1";

/// Arguments decoded from a launch URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchUri {
    pub args: Vec<String>,
    /// Channel the link asked for; informational only.
    pub channel: Option<String>,
}

/// Outcome of reconciling the configured channel with a link's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDecision {
    pub channel: String,
    /// The link's channel when it disagreed and was overruled.
    pub ignored: Option<String>,
}

pub fn is_launch_uri(arg: &str) -> bool {
    arg.starts_with(PLAYER_URI_SCHEME)
}

/// Decode a launch URI into player arguments. Unknown keys are passed
/// through verbatim.
pub fn parse_launch_uri(raw: &str) -> LaunchUri {
    let body = raw.strip_prefix(PLAYER_URI_SCHEME).unwrap_or(raw);
    let mut parsed = LaunchUri::default();

    for segment in body.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = segment.split_once('=') else {
            parsed.args.push(segment.to_string());
            continue;
        };

        match key {
            "launchmode" => parsed.args.push(format!("--{value}")),
            "gameinfo" => parsed.args.extend(["-t".to_string(), value.to_string()]),
            "placelauncherurl" => {
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                parsed.args.extend(["-j".to_string(), decoded]);
            }
            "launchtime" => parsed.args.push(format!("--launchtime={value}")),
            "browsertrackerid" => parsed.args.extend(["-b".to_string(), value.to_string()]),
            "robloxLocale" => parsed.args.extend(["--rloc".to_string(), value.to_string()]),
            "gameLocale" => parsed.args.extend(["--gloc".to_string(), value.to_string()]),
            "channel" => {
                parsed.channel = Some(normalize_channel(value));
                parsed.args.extend(["-channel".to_string(), value.to_string()]);
            }
            _ => {
                debug!("Passing unknown launch URI field through: {}", key);
                parsed.args.push(segment.to_string());
            }
        }
    }

    parsed
}

/// The configured channel always wins over a link's channel.
pub fn select_channel(configured: &str, requested: Option<&str>) -> ChannelDecision {
    let configured = normalize_channel(configured);

    let ignored = requested
        .map(normalize_channel)
        .filter(|requested| *requested != configured);

    if let Some(requested) = &ignored {
        warn!(
            "Launch URI asks for channel {:?}, forcing configured channel {:?}",
            requested, configured
        );
    }

    ChannelDecision {
        channel: configured,
        ignored,
    }
}
