//! Decoding of GSPMD sharding attribute strings into device-mesh geometry.
//!
//! Frontends annotate tensors with compact sharding strings such as `{devices=[2,1,4]<=[2,4]}` or `{replicated}`.
//! [`parse_gspmd_sharding`] turns such a string into a [`MeshSharding`] describing how the tensor is laid out over a
//! two-dimensional device mesh, which is what [`crate::operations::MeshShardOp`] carries into lowering.
//!
//! # Grammar
//!
//! ```text
//! sharding := "{" token (" " token)* "}"
//! token    := "manual" | "replicated" | "maximal" | "device=" int
//!           | "devices=" dims "<=" dims ["T(" int ("," int)* ")"]
//!           | "last_tile_dim_replicate"
//! dims     := "[" int ("," int)* "]"
//! ```
//!
//! Tokens are only legal in specific positions: `device=` must directly follow `maximal`, `last_tile_dim_replicate`
//! must follow `devices=`, and at most one of `replicated`, `maximal`, or `devices=` may appear. Unknown tokens are
//! skipped. The optional transpose permutation after the device list is accepted but not interpreted.
//!
//! # Dimension inference
//!
//! The target hardware mesh is assumed to be either a `1 × N` line or a true `R × C` mesh. When the device list only
//! gives a flat device count (e.g., `<=[8]`), the mesh is reconstructed from the shard shape: a shard shape entry
//! equal to the device count marks a line, otherwise the non-unit shard entries form the mesh. A shard shape entry that
//! happens to equal the device count on a true 2-D mesh is therefore classified as a line.

use std::fmt::{Display, Formatter};

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for GSPMD sharding string decoding.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShardingError {
    /// Error returned when the sharding string is not wrapped in braces.
    #[error("sharding string '{input}' must be enclosed in '{{' and '}}'")]
    MissingBraces { input: String },

    /// Error returned when a token appears in a position where it is not allowed.
    #[error("unexpected token '{token}' after {state}")]
    UnexpectedToken { token: String, state: ParserState },

    /// Error returned when `maximal` is not followed by a `device=` token.
    #[error("'maximal' must be followed by a 'device=<id>' token")]
    MissingMaximalDevice,

    /// Error returned when an integer cannot be parsed.
    #[error("invalid integer '{text}' in sharding string")]
    InvalidInteger { text: String },

    /// Error returned when a bracketed dimension list is malformed.
    #[error("invalid dimension list '{text}', expected '[d0,d1,...]'")]
    InvalidDimensions { text: String },

    /// Error returned when the number of devices in the mesh does not fit in an `i64`.
    #[error("device mesh {mesh_shape:?} has more devices than can be represented")]
    MeshTooLarge { mesh_shape: Vec<i64> },

    /// Error returned when the device mesh cannot be reduced to exactly two dimensions.
    #[error("device mesh {mesh_shape:?} must have exactly 2 dimensions")]
    UnsupportedMeshRank { mesh_shape: Vec<i64> },

    /// Error returned when more tensor axes are sharded than there are mesh dimensions to hold them.
    #[error("shard shape {shard_shape:?} shards more axes than mesh {mesh_shape:?} has dimensions")]
    TooManyShardedAxes { shard_shape: Vec<i64>, mesh_shape: Vec<i64> },

    /// Error returned when a sharded tensor axis does not match the size of the mesh dimension it maps to.
    #[error(
        "tensor axis #{axis} is split {shard_size} ways, but mesh dimension #{mesh_dimension} has size {mesh_size}"
    )]
    ShardMeshMismatch { axis: usize, shard_size: i64, mesh_dimension: usize, mesh_size: i64 },
}

// ---------------------------------------------------------------------------
// MeshSharding
// ---------------------------------------------------------------------------

/// Kind of sharding described by a sharding string.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MeshShardType {
    /// The tensor is already sharded by the user and must be passed through untouched.
    #[default]
    Manual,

    /// Every device holds the full tensor.
    Replicate,

    /// A single device holds the full tensor.
    Maximal,

    /// The tensor is split across the devices of a mesh.
    Devices,
}

impl Display for MeshShardType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Manual => "manual",
            Self::Replicate => "replicate",
            Self::Maximal => "maximal",
            Self::Devices => "devices",
        })
    }
}

/// Device-mesh geometry decoded from a sharding string.
///
/// For [`MeshShardType::Devices`] shardings, [`MeshSharding::mesh_shape`] always has exactly two entries and
/// [`MeshSharding::shard_dims`] has one entry per mesh dimension holding the tensor axis sharded along that dimension,
/// or `-1` when the tensor is replicated along it. Every other sharding type uses the single-entry placeholder `[-1]`
/// for both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MeshSharding {
    pub shard_type: MeshShardType,

    /// Number of ways each tensor axis is split (`1` means not split). For [`MeshShardType::Maximal`] shardings, the
    /// entry following the leading `1` is the id of the device that holds the tensor.
    pub shard_shape: Vec<i64>,

    pub mesh_shape: Vec<i64>,

    pub shard_dims: Vec<i64>,

    /// Whether the trailing shard shape entry counted replicas rather than splits of a tensor axis. It has already
    /// been removed from [`MeshSharding::shard_shape`] when this is `true`.
    pub last_tile_dim_replicate: bool,

    /// Whether the hardware mesh was detected to be a `1 × N` line. Detection only checks whether some entry of the
    /// shard shape equals the total number of devices, so an axis that spans every device of a 2-D mesh is also
    /// reported as a line.
    pub line_device_config: bool,
}

impl MeshSharding {
    /// Returns `true` if this sharding splits the tensor across devices.
    pub fn is_device_sharding(&self) -> bool {
        self.shard_type == MeshShardType::Devices
    }

    /// Total number of devices in the mesh, or `None` for shardings without a mesh.
    pub fn device_count(&self) -> Option<i64> {
        if !self.is_device_sharding() {
            return None;
        }
        self.mesh_shape.iter().try_fold(1i64, |count, &size| count.checked_mul(size))
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// State of the sharding string parser after consuming a token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParserState {
    Start,
    Manual,
    Replicated,
    AwaitingDevice,
    Maximal,
    Devices,
}

impl Display for ParserState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Start => "start of sharding",
            Self::Manual => "'manual'",
            Self::Replicated => "'replicated'",
            Self::AwaitingDevice => "'maximal'",
            Self::Maximal => "'device='",
            Self::Devices => "'devices='",
        })
    }
}

enum Token<'s> {
    Manual,
    Replicated,
    Maximal,
    Device(&'s str),
    Devices(&'s str),
    LastTileDimReplicate,
    Unknown(&'s str),
}

impl<'s> Token<'s> {
    fn lex(text: &'s str) -> Self {
        match text {
            "manual" => Self::Manual,
            "replicated" => Self::Replicated,
            "maximal" => Self::Maximal,
            "last_tile_dim_replicate" => Self::LastTileDimReplicate,
            _ => {
                if let Some(devices) = text.strip_prefix("devices=") {
                    Self::Devices(devices)
                } else if let Some(device) = text.strip_prefix("device=") {
                    Self::Device(device)
                } else {
                    Self::Unknown(text)
                }
            }
        }
    }
}

/// Parses a GSPMD sharding string (e.g., `{devices=[1,2,4]<=[8]}`) into a [`MeshSharding`].
pub fn parse_gspmd_sharding(input: &str) -> Result<MeshSharding, ShardingError> {
    let body = input
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| ShardingError::MissingBraces { input: input.to_string() })?;

    let mut sharding = MeshSharding::default();
    let mut state = ParserState::Start;
    for text in body.split(' ') {
        let unexpected = move || ShardingError::UnexpectedToken { token: text.to_string(), state };
        let accepts_sharding = matches!(state, ParserState::Start | ParserState::Manual);
        state = match Token::lex(text) {
            Token::Manual if accepts_sharding => {
                sharding.shard_shape.push(1);
                ParserState::Manual
            }
            Token::Replicated if accepts_sharding => {
                sharding.shard_shape.push(1);
                ParserState::Replicated
            }
            Token::Maximal if accepts_sharding => {
                sharding.shard_shape.push(1);
                ParserState::AwaitingDevice
            }
            Token::Device(device) if state == ParserState::AwaitingDevice => {
                sharding.shard_shape.push(parse_integer(device)?);
                ParserState::Maximal
            }
            Token::Devices(devices) if accepts_sharding => {
                parse_devices(devices, &mut sharding)?;
                ParserState::Devices
            }
            Token::LastTileDimReplicate if state == ParserState::Devices => {
                sharding.last_tile_dim_replicate = true;
                ParserState::Devices
            }
            Token::Unknown(token) => {
                log::debug!("skipping unknown sharding token '{token}' in '{input}'");
                state
            }
            _ => return Err(unexpected()),
        };
    }

    sharding.shard_type = match state {
        ParserState::Start | ParserState::Manual => MeshShardType::Manual,
        ParserState::Replicated => MeshShardType::Replicate,
        ParserState::AwaitingDevice => return Err(ShardingError::MissingMaximalDevice),
        ParserState::Maximal => MeshShardType::Maximal,
        ParserState::Devices => MeshShardType::Devices,
    };

    if sharding.is_device_sharding() {
        determine_sharding_dims(&mut sharding)?;
    } else {
        sharding.shard_dims = vec![-1];
        sharding.mesh_shape = vec![-1];
    }
    Ok(sharding)
}

fn parse_integer(text: &str) -> Result<i64, ShardingError> {
    text.parse::<i64>().map_err(|_| ShardingError::InvalidInteger { text: text.to_string() })
}

fn parse_dimensions(text: &str) -> Result<Vec<i64>, ShardingError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ShardingError::InvalidDimensions { text: text.to_string() })?;
    inner.split(',').map(parse_integer).collect()
}

/// Parses the payload of a `devices=` token (e.g., `[4,2,1]<=[2,4]T(1,0)`).
fn parse_devices(devices: &str, sharding: &mut MeshSharding) -> Result<(), ShardingError> {
    let (axes, rest) = devices.split_once("<=").unwrap_or((devices, ""));
    sharding.shard_shape = parse_dimensions(axes)?;
    let reshape = rest.split('T').next().unwrap_or_default();
    sharding.mesh_shape = parse_dimensions(reshape)?;
    Ok(())
}

/// Completes a [`MeshShardType::Devices`] sharding by normalizing its mesh to two dimensions and assigning each sharded
/// tensor axis to a mesh dimension.
///
/// When the sharding string supplied an explicit mesh, sharded axes are first matched against the mesh from its last
/// dimension to its first. If that assignment does not fit and the mesh is not a line, front-to-back matching is
/// attempted before giving up, so that strings like `devices=[2,1,4]<=[2,4]` (axis 0 on mesh dimension 0) are
/// accepted alongside the more common reversed form. Explicit line meshes get no second attempt, so
/// `devices=[1,8]<=[1,8]` is rejected.
pub fn determine_sharding_dims(sharding: &mut MeshSharding) -> Result<(), ShardingError> {
    let full_shard_shape = sharding.shard_shape.clone();
    if sharding.last_tile_dim_replicate {
        sharding.shard_shape.pop();
    }

    let reverse_order = sharding.mesh_shape.len() != 1;
    let total_devices = sharding
        .mesh_shape
        .iter()
        .try_fold(1i64, |count, &size| count.checked_mul(size))
        .ok_or_else(|| ShardingError::MeshTooLarge { mesh_shape: sharding.mesh_shape.clone() })?;
    let line_device_config = full_shard_shape.contains(&total_devices);
    if !reverse_order {
        sharding.mesh_shape = if line_device_config {
            vec![1, total_devices]
        } else {
            full_shard_shape.iter().copied().filter(|&size| size != 1).collect()
        };
    }
    if sharding.mesh_shape.len() != 2 {
        return Err(ShardingError::UnsupportedMeshRank { mesh_shape: sharding.mesh_shape.clone() });
    }

    sharding.line_device_config = line_device_config;
    sharding.shard_dims = match assign_shard_dims(sharding, reverse_order) {
        Ok(shard_dims) => shard_dims,
        Err(error) if reverse_order && !line_device_config => assign_shard_dims(sharding, false).map_err(|_| error)?,
        Err(error) => return Err(error),
    };
    Ok(())
}

fn assign_shard_dims(sharding: &MeshSharding, reverse_order: bool) -> Result<Vec<i64>, ShardingError> {
    let mesh_rank = sharding.mesh_shape.len();
    let too_many_axes = || ShardingError::TooManyShardedAxes {
        shard_shape: sharding.shard_shape.clone(),
        mesh_shape: sharding.mesh_shape.clone(),
    };

    let mut shard_dims = vec![-1; mesh_rank];
    // A line mesh is `1 × N`, so the first mesh dimension never receives a sharded axis.
    let mut sharded_count = usize::from(sharding.line_device_config);
    for (axis, &shard_size) in sharding.shard_shape.iter().enumerate() {
        if shard_size == 1 {
            continue;
        }
        let mesh_dimension = if reverse_order {
            mesh_rank.checked_sub(1 + sharded_count).ok_or_else(too_many_axes)?
        } else {
            sharded_count
        };
        let mesh_size = *sharding.mesh_shape.get(mesh_dimension).ok_or_else(too_many_axes)?;
        if shard_size != mesh_size {
            return Err(ShardingError::ShardMeshMismatch { axis, shard_size, mesh_dimension, mesh_size });
        }
        shard_dims[mesh_dimension] = axis as i64;
        sharded_count += 1;
    }
    Ok(shard_dims)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_replicated_sharding() {
        let sharding = parse_gspmd_sharding("{replicated}").unwrap();
        assert_eq!(
            sharding,
            MeshSharding {
                shard_type: MeshShardType::Replicate,
                shard_shape: vec![1],
                mesh_shape: vec![-1],
                shard_dims: vec![-1],
                last_tile_dim_replicate: false,
                line_device_config: false,
            },
        );
        assert_eq!(sharding.device_count(), None);
    }

    #[test]
    fn test_manual_and_maximal_shardings() {
        let sharding = parse_gspmd_sharding("{manual}").unwrap();
        assert_eq!(sharding.shard_type, MeshShardType::Manual);
        assert_eq!(sharding.shard_shape, vec![1]);

        let sharding = parse_gspmd_sharding("{maximal device=3}").unwrap();
        assert_eq!(sharding.shard_type, MeshShardType::Maximal);
        assert_eq!(sharding.shard_shape, vec![1, 3]);
        assert_eq!(sharding.mesh_shape, vec![-1]);
        assert_eq!(sharding.shard_dims, vec![-1]);
    }

    #[test]
    fn test_line_mesh_normalization() {
        let sharding = parse_gspmd_sharding("{devices=[1,4]<=[4]}").unwrap();
        assert_eq!(sharding.shard_type, MeshShardType::Devices);
        assert_eq!(sharding.mesh_shape, vec![1, 4]);
        assert_eq!(sharding.shard_dims, vec![-1, 1]);
        assert!(sharding.line_device_config);
        assert_eq!(sharding.device_count(), Some(4));
    }

    #[test]
    fn test_flat_device_count_mesh_inference() {
        let sharding = parse_gspmd_sharding("{devices=[1,2,4]<=[8]}").unwrap();
        assert_eq!(sharding.mesh_shape, vec![2, 4]);
        assert_eq!(sharding.shard_dims, vec![1, 2]);
        assert!(!sharding.line_device_config);
    }

    #[test]
    fn test_explicit_mesh_inference() {
        let sharding = parse_gspmd_sharding("{devices=[2,1,4]<=[2,4]}").unwrap();
        assert_eq!(sharding.mesh_shape, vec![2, 4]);
        assert_eq!(sharding.shard_dims, vec![0, 2]);

        let sharding = parse_gspmd_sharding("{devices=[4,1,2]<=[2,4]T(1,0)}").unwrap();
        assert_eq!(sharding.mesh_shape, vec![2, 4]);
        assert_eq!(sharding.shard_dims, vec![2, 0]);
    }

    #[test]
    fn test_last_tile_dim_replicate() {
        let sharding = parse_gspmd_sharding("{devices=[1,4,2]<=[8] last_tile_dim_replicate}").unwrap();
        assert!(sharding.last_tile_dim_replicate);
        assert_eq!(sharding.shard_shape, vec![1, 4]);
        assert_eq!(sharding.mesh_shape, vec![4, 2]);
        assert_eq!(sharding.shard_dims, vec![1, -1]);
    }

    #[test]
    fn test_mismatch_rejection() {
        assert!(matches!(
            parse_gspmd_sharding("{devices=[3,1,4]<=[2,4]}"),
            Err(ShardingError::ShardMeshMismatch { axis: 0, shard_size: 3, mesh_dimension: 1, mesh_size: 4 }),
        ));
        assert!(matches!(
            parse_gspmd_sharding("{devices=[1,8]<=[1,8]}"),
            Err(ShardingError::ShardMeshMismatch { axis: 1, shard_size: 8, mesh_dimension: 0, mesh_size: 1 }),
        ));
        assert!(matches!(
            parse_gspmd_sharding("{devices=[2,2,2]<=[8]}"),
            Err(ShardingError::UnsupportedMeshRank { mesh_shape }) if mesh_shape == vec![2, 2, 2],
        ));
        assert!(matches!(
            parse_gspmd_sharding("{devices=[2,2,2]<=[2,2,2]}"),
            Err(ShardingError::UnsupportedMeshRank { .. }),
        ));
    }

    #[test]
    fn test_token_sequencing_errors() {
        assert!(matches!(
            parse_gspmd_sharding("{device=1}"),
            Err(ShardingError::UnexpectedToken { token, state: ParserState::Start }) if token == "device=1",
        ));
        assert!(matches!(parse_gspmd_sharding("{maximal}"), Err(ShardingError::MissingMaximalDevice)));
        assert!(matches!(
            parse_gspmd_sharding("{replicated last_tile_dim_replicate}"),
            Err(ShardingError::UnexpectedToken { state: ParserState::Replicated, .. }),
        ));
        assert!(matches!(
            parse_gspmd_sharding("{replicated maximal device=0}"),
            Err(ShardingError::UnexpectedToken { state: ParserState::Replicated, .. }),
        ));
    }

    #[test]
    fn test_malformed_strings() {
        assert!(matches!(parse_gspmd_sharding("replicated"), Err(ShardingError::MissingBraces { .. })));
        assert!(matches!(parse_gspmd_sharding("{maximal device=x}"), Err(ShardingError::InvalidInteger { .. })));
        assert!(matches!(parse_gspmd_sharding("{devices=1,4<=[4]}"), Err(ShardingError::InvalidDimensions { .. })));
        assert!(matches!(parse_gspmd_sharding("{devices=[1,4]}"), Err(ShardingError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_oversized_meshes() {
        assert_eq!(
            parse_gspmd_sharding("{devices=[1,2]<=[4611686018427387904,4]}"),
            Err(ShardingError::MeshTooLarge { mesh_shape: vec![4611686018427387904, 4] }),
        );
        assert_eq!(
            parse_gspmd_sharding("{devices=[1,2]<=[9223372036854775807,9223372036854775807]}"),
            Err(ShardingError::MeshTooLarge { mesh_shape: vec![i64::MAX, i64::MAX] }),
        );
    }

    #[test]
    fn test_unknown_tokens_are_skipped() {
        let sharding = parse_gspmd_sharding("{devices=[1,4]<=[4] metadata=foo}").unwrap();
        assert_eq!(sharding.mesh_shape, vec![1, 4]);
    }

    proptest! {
        #[test]
        fn test_parsing_is_deterministic(
            shard_shape in prop::collection::vec(prop::sample::select(vec![1i64, 2, 4, 8]), 1..4),
            mesh_shape in prop::collection::vec(prop::sample::select(vec![1i64, 2, 4, 8]), 1..3),
            last_tile_dim_replicate in any::<bool>(),
        ) {
            let render = |dims: &[i64]| dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",");
            let suffix = if last_tile_dim_replicate { " last_tile_dim_replicate" } else { "" };
            let input = format!("{{devices=[{}]<=[{}]{suffix}}}", render(&shard_shape), render(&mesh_shape));
            let first = parse_gspmd_sharding(&input);
            let second = parse_gspmd_sharding(&input);
            prop_assert_eq!(&first, &second);
            if let Ok(sharding) = first {
                prop_assert_eq!(sharding.mesh_shape.len(), 2);
                prop_assert_eq!(sharding.shard_dims.len(), 2);
                for (mesh_dimension, &axis) in sharding.shard_dims.iter().enumerate() {
                    if axis >= 0 {
                        prop_assert_eq!(sharding.shard_shape[axis as usize], sharding.mesh_shape[mesh_dimension]);
                    }
                }
            }
        }
    }
}
