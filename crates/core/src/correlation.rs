//! Correlation of fan-out requests with their replies.

use benchnet_messages::Envelope;
use std::collections::HashMap;
use tracing::debug;

/// `(prefix, message id)` of a message. The prefix scopes the short random
/// message ids to one pairing, so concurrent exchanges with different peers
/// cannot collide.
pub type CorrelationKey = (String, String);

struct Record {
    input: Envelope,
    waiting: Vec<CorrelationKey>,
    // Arrival order matters downstream: drained replies keep it.
    acked: Vec<(CorrelationKey, Envelope)>,
}

/// Tracks which outgoing requests were spawned by which inbound message.
///
/// A record lives from [`Correlator::track`] until [`Correlator::drain`];
/// a fan-out whose replies never all arrive is held indefinitely.
#[derive(Default)]
pub struct Correlator {
    records: HashMap<CorrelationKey, Record>,
}

impl Correlator {
    /// Start tracking `input` and the requests it fanned out into.
    ///
    /// Every message involved must already carry a prefix; returns false
    /// (and tracks nothing) otherwise. Tracking the same input again
    /// replaces its pending fan-out.
    pub fn track(&mut self, input: &Envelope, outputs: &[Envelope]) -> bool {
        let Some(input_key) = input.correlation_key() else {
            debug!(id = %input.id, "input has no prefix, not tracked");
            return false;
        };
        let mut waiting = Vec::with_capacity(outputs.len());
        for output in outputs {
            match output.correlation_key() {
                Some(key) => waiting.push(key),
                None => {
                    debug!(id = %output.id, "output has no prefix, not tracked");
                    return false;
                }
            }
        }
        debug!(prefix = %input_key.0, id = %input_key.1, outputs = waiting.len(), "fan-out tracked");
        self.records.insert(
            input_key,
            Record {
                input: input.clone(),
                waiting,
                acked: Vec::new(),
            },
        );
        true
    }

    /// The input whose fan-out `reply` answers, if any.
    pub fn input_key_for(&self, reply: &Envelope) -> Option<CorrelationKey> {
        let reply_key = reply.correlation_key()?;
        self.records
            .iter()
            .find(|(_, record)| {
                record.waiting.contains(&reply_key)
                    || record.acked.iter().any(|(key, _)| *key == reply_key)
            })
            .map(|(key, _)| key.clone())
    }

    /// Record `reply` against the fan-out waiting on it. Returns false when
    /// no tracked record expects this reply.
    pub fn ack(&mut self, reply: &Envelope) -> bool {
        let Some(input_key) = self.input_key_for(reply) else {
            return false;
        };
        let Some(reply_key) = reply.correlation_key() else {
            return false;
        };
        if let Some(record) = self.records.get_mut(&input_key) {
            match record.acked.iter_mut().find(|(key, _)| *key == reply_key) {
                Some((_, stored)) => *stored = reply.clone(),
                None => record.acked.push((reply_key, reply.clone())),
            }
            return true;
        }
        false
    }

    /// Whether the fan-out `reply` belongs to has every reply in.
    ///
    /// Complete means the waiting and acked key sequences have equal length
    /// and, once sorted, are pairwise equal.
    pub fn all_acked(&self, reply: &Envelope) -> bool {
        let Some(input_key) = self.input_key_for(reply) else {
            return false;
        };
        let Some(record) = self.records.get(&input_key) else {
            return false;
        };
        if record.waiting.len() != record.acked.len() {
            return false;
        }
        let mut waiting: Vec<_> = record.waiting.clone();
        let mut acked: Vec<_> = record.acked.iter().map(|(key, _)| key.clone()).collect();
        waiting.sort();
        acked.sort();
        waiting.iter().zip(acked.iter()).all(|(w, a)| w == a)
    }

    /// The tracked input message for `key`.
    pub fn input(&self, key: &CorrelationKey) -> Option<&Envelope> {
        self.records.get(key).map(|record| &record.input)
    }

    /// Close the record for `key`, yielding the input and collected replies
    /// in the order they arrived.
    pub fn drain(&mut self, key: &CorrelationKey) -> Option<(Envelope, Vec<Envelope>)> {
        self.records.remove(key).map(|record| {
            let replies = record.acked.into_iter().map(|(_, reply)| reply).collect();
            (record.input, replies)
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchnet_messages::{Hello, Info, Request, Response};
    use serde_json::Value;

    fn request(id: &str, prefix: &str) -> Envelope {
        let mut envelope = Envelope::request_with_id(
            id,
            Request::Hello(Hello {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                contacts: vec![],
            }),
        );
        envelope.to(format!("http://10.0.0.9:8989/{prefix}"), Some(prefix.into()));
        envelope
    }

    fn inbound(id: &str, prefix: &str) -> Envelope {
        let mut envelope = Envelope::request_with_id(
            id,
            Request::Hello(Hello {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                contacts: vec![],
            }),
        );
        envelope.received_via("10.0.0.9", prefix);
        envelope
    }

    fn reply(id: &str, prefix: &str) -> Envelope {
        let mut envelope = Envelope::response_to(
            id,
            Response::Info(Info {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                features: Value::Null,
            }),
        );
        envelope.received_via("10.0.0.9", prefix);
        envelope
    }

    #[test]
    fn test_completion_requires_every_reply() {
        let mut correlator = Correlator::default();
        let input = inbound("50", "100");
        let outputs = vec![request("7", "200"), request("8", "300")];
        assert!(correlator.track(&input, &outputs));

        let first = reply("7", "200");
        assert!(correlator.ack(&first));
        assert!(!correlator.all_acked(&first));

        let second = reply("8", "300");
        assert!(correlator.ack(&second));
        assert!(correlator.all_acked(&second));

        let key = correlator.input_key_for(&second).unwrap();
        assert_eq!(key, ("100".to_string(), "50".to_string()));
        let (drained, replies) = correlator.drain(&key).unwrap();
        assert_eq!(drained.id, "50");
        assert_eq!(replies.len(), 2);
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_drain_keeps_reply_arrival_order() {
        let mut correlator = Correlator::default();
        let input = inbound("50", "100");
        assert!(correlator.track(&input, &[request("7", "200"), request("8", "300")]));
        // Replies land in the reverse of the fan-out order.
        assert!(correlator.ack(&reply("8", "300")));
        assert!(correlator.ack(&reply("7", "200")));

        let key = correlator.input_key_for(&reply("7", "200")).unwrap();
        let (_, replies) = correlator.drain(&key).unwrap();
        let ids: Vec<_> = replies.iter().map(|reply| reply.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "7"]);
    }

    #[test]
    fn test_unexpected_reply_not_acked() {
        let mut correlator = Correlator::default();
        let input = inbound("50", "100");
        assert!(correlator.track(&input, &[request("7", "200")]));
        assert!(!correlator.ack(&reply("7", "999")));
        assert!(!correlator.ack(&reply("9", "200")));
    }

    #[test]
    fn test_duplicate_reply_counts_once() {
        let mut correlator = Correlator::default();
        let input = inbound("50", "100");
        assert!(correlator.track(&input, &[request("7", "200"), request("8", "300")]));
        assert!(correlator.ack(&reply("7", "200")));
        assert!(correlator.ack(&reply("7", "200")));
        assert!(!correlator.all_acked(&reply("7", "200")));
    }

    #[test]
    fn test_untracked_without_prefix() {
        let mut correlator = Correlator::default();
        let input = Envelope::response_to(
            "50",
            Response::Info(Info {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                features: Value::Null,
            }),
        );
        assert!(!correlator.track(&input, &[]));
    }
}
