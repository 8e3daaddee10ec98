use cutline_api::marker::{MarkerRecord, MarkerType};
use cutline_api::{Error, FrameTime, Result};
use serde_json::Value;
use tracing::instrument;

use super::{MarkerLabel, MarkerList};
use crate::undo::Transaction;

const DEFAULT_COMMENT: &str = "Marker";

impl MarkerList {
    /// Serializes every marker in storage order as
    /// `[{ "pos": .., "comment": .., "type": .. }]`.
    pub fn to_json(&self) -> Result<String> {
        let records: Vec<MarkerRecord> = self.iter().map(MarkerRecord::from).collect();
        serde_json::to_string(&records).map_err(Error::new_internal)
    }

    /// Imports markers from a JSON array. Malformed entries are skipped.
    /// Unless `ignore_conflicts` is set, an existing marker with a different
    /// comment or type at an imported frame fails the whole import.
    #[instrument(level = "trace", skip_all, err)]
    pub fn import_from_json(
        &mut self,
        data: &str,
        ignore_conflicts: bool,
        push_undo: bool,
    ) -> Result<()> {
        let mut tx = Transaction::new();
        self.import_from_json_in(&mut tx, data, ignore_conflicts)?;

        if push_undo {
            let name = if self.owner.is_guide() {
                "Import guides"
            } else {
                "Import markers"
            };
            self.push_undo(name, tx);
        }

        Ok(())
    }

    pub fn import_from_json_in(
        &mut self,
        tx: &mut Transaction,
        data: &str,
        ignore_conflicts: bool,
    ) -> Result<()> {
        let value: Value = serde_json::from_str(data).map_err(Error::new_json)?;
        let Value::Array(entries) = value else {
            return Err(Error::InvalidJson {
                message: "expected an array of markers".into(),
            });
        };

        let mut local = Transaction::new();
        for entry in &entries {
            let Some((time, label)) = parse_entry(entry) else {
                continue;
            };

            if let Some(existing) = self.marker_at(time) {
                if MarkerLabel::from(existing) == label {
                    continue;
                }

                if !ignore_conflicts {
                    self.rollback(local);
                    return Err(Error::MarkerConflict {
                        frame: time.frames(),
                    });
                }
            }

            let added = self.add_marker_in(&mut local, time, label.comment, Some(label.kind));
            if let Err(error) = added {
                self.rollback(local);
                return Err(error);
            }
        }

        tx.extend(local);
        Ok(())
    }
}

fn parse_entry(entry: &Value) -> Option<(FrameTime, MarkerLabel)> {
    let Some(object) = entry.as_object() else {
        tracing::warn!(%entry, "skipping marker entry that is not an object");
        return None;
    };

    let Some(pos) = object.get("pos").and_then(as_integer) else {
        tracing::warn!(%entry, "skipping marker entry without a position");
        return None;
    };

    let comment = object
        .get("comment")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_COMMENT)
        .to_owned();

    let kind = match object.get("type") {
        None => MarkerType::default(),
        Some(value) => match as_integer(value).map(MarkerType::try_from) {
            Some(Ok(kind)) => kind,
            _ => {
                tracing::warn!(%value, "invalid marker type, using the default");
                MarkerType::default()
            }
        },
    };

    Some((FrameTime::from_frames(pos), MarkerLabel { comment, kind }))
}

/// Integer value of `value`, also accepting floats without a fraction.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }

    let float = value.as_f64()?;
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    (float.fract() == 0.0 && in_range).then_some(float as i64)
}
