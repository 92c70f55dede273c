// Copyright 2023 Bitwise IO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The recovery blob exchanged with the coordinator and persisted by resources.
//!
//! A recovery blob lets a restarted process resume an in-doubt enlistment. It is the only
//! artifact of this crate that outlives a process, so its layout must remain stable across
//! versions:
//!
//! ```text
//! +----------------+---------------------+----------+-------------+----------+-------------+
//! | transaction id | resource manager id | node len | node (utf8) | tok len  | token       |
//! | 16 bytes       | 16 bytes            | u32 LE   | node len    | u32 LE   | tok len     |
//! +----------------+---------------------+----------+-------------+----------+-------------+
//! ```

use uuid::Uuid;

use crate::error::MalformedRecoveryDataError;

const ID_LEN: usize = 16;
const HEADER_LEN: usize = ID_LEN * 2;
const LENGTH_FIELD_LEN: usize = 4;

/// The decoded contents of a recovery blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecoveryToken {
    pub transaction_id: Uuid,
    pub resource_manager_id: Uuid,
    /// Identity of the node that created the enlistment.
    pub node_identity: String,
    /// Opaque prepare information supplied by (or synthesized for) the coordinator.
    pub coordinator_token: Vec<u8>,
}

impl RecoveryToken {
    pub fn new(
        transaction_id: Uuid,
        resource_manager_id: Uuid,
        node_identity: String,
        coordinator_token: Vec<u8>,
    ) -> Self {
        RecoveryToken {
            transaction_id,
            resource_manager_id,
            node_identity,
            coordinator_token,
        }
    }
}

/// Serializes a token into a recovery blob.
pub fn encode(token: &RecoveryToken) -> Vec<u8> {
    let node = token.node_identity.as_bytes();
    let mut blob = Vec::with_capacity(
        HEADER_LEN + 2 * LENGTH_FIELD_LEN + node.len() + token.coordinator_token.len(),
    );
    blob.extend_from_slice(token.transaction_id.as_bytes());
    blob.extend_from_slice(token.resource_manager_id.as_bytes());
    put_section(&mut blob, node);
    put_section(&mut blob, &token.coordinator_token);
    blob
}

/// Deserializes a recovery blob.
///
/// # Errors
///
/// A [`MalformedRecoveryDataError`] is returned if the blob is shorter than the fixed header, if
/// an embedded length runs past the end of the blob, if bytes remain after the coordinator token,
/// or if the node identity is not valid UTF-8.
pub fn decode(blob: &[u8]) -> Result<RecoveryToken, MalformedRecoveryDataError> {
    if blob.len() < HEADER_LEN {
        return Err(MalformedRecoveryDataError::with_message(format!(
            "blob is {} bytes, shorter than the {} byte header",
            blob.len(),
            HEADER_LEN
        )));
    }

    let transaction_id = read_id(&blob[..ID_LEN])?;
    let resource_manager_id = read_id(&blob[ID_LEN..HEADER_LEN])?;

    let (node, rest) = take_section(&blob[HEADER_LEN..], "node identity")?;
    let (coordinator_token, rest) = take_section(rest, "coordinator token")?;

    if !rest.is_empty() {
        return Err(MalformedRecoveryDataError::with_message(format!(
            "{} unexpected trailing bytes",
            rest.len()
        )));
    }

    let node_identity = String::from_utf8(node.to_vec()).map_err(|_| {
        MalformedRecoveryDataError::with_message("node identity is not valid UTF-8".into())
    })?;

    Ok(RecoveryToken {
        transaction_id,
        resource_manager_id,
        node_identity,
        coordinator_token: coordinator_token.to_vec(),
    })
}

/// Builds the coordinator token used when the resource prepares during phase 0.
///
/// No coordinator prepare information exists that early, so the token is the transaction id
/// followed by the resource manager id.
pub fn phase0_token(transaction_id: &Uuid, resource_manager_id: &Uuid) -> Vec<u8> {
    let mut token = Vec::with_capacity(HEADER_LEN);
    token.extend_from_slice(transaction_id.as_bytes());
    token.extend_from_slice(resource_manager_id.as_bytes());
    token
}

fn put_section(blob: &mut Vec<u8>, section: &[u8]) {
    blob.extend_from_slice(&(section.len() as u32).to_le_bytes());
    blob.extend_from_slice(section);
}

fn take_section<'a>(
    bytes: &'a [u8],
    name: &str,
) -> Result<(&'a [u8], &'a [u8]), MalformedRecoveryDataError> {
    if bytes.len() < LENGTH_FIELD_LEN {
        return Err(MalformedRecoveryDataError::with_message(format!(
            "missing {} length",
            name
        )));
    }
    let (len_bytes, rest) = bytes.split_at(LENGTH_FIELD_LEN);
    let len = u32::from_le_bytes(len_bytes.try_into().map_err(|_| {
        MalformedRecoveryDataError::with_message(format!("unreadable {} length", name))
    })?) as usize;

    if rest.len() < len {
        return Err(MalformedRecoveryDataError::with_message(format!(
            "{} length {} exceeds the {} remaining bytes",
            name,
            len,
            rest.len()
        )));
    }

    Ok(rest.split_at(len))
}

fn read_id(bytes: &[u8]) -> Result<Uuid, MalformedRecoveryDataError> {
    Uuid::from_slice(bytes)
        .map_err(|e| MalformedRecoveryDataError::with_message(format!("invalid identifier: {}", e)))
}
