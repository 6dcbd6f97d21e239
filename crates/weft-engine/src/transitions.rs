//! Per-term-kind transition rules.
//!
//! Each rule turns a checked term into a [`Mod`]: the revision locks taken,
//! the binding events appended, the pending records written or consumed, and
//! the processes and channels created. Symmetric pairs (close/wait,
//! send/receive, label/case) share the rendezvous path; spawn and call
//! always resolve synchronously; forward dispatches on polarity and on
//! whatever record already exists for its channel.

use tracing::debug;
use weft_core::{ChannelId, PoolId, ProcessId, Result, TypeId, WeftError};
use weft_store::{Mod, PersistencePort, ProcessRecord};
use weft_types::{
    BindingEvent, Configuration, Endpoint, Env, Offer, PendingStep, Polarity, Term, TypeStore,
};

/// A transition's effect batch plus the next work item, if the step fully
/// resolved.
pub(crate) struct Outcome {
    pub batch: Mod,
    pub next: Option<(PoolId, ProcessId, Term)>,
}

impl Outcome {
    fn suspended(batch: Mod) -> Self {
        Self { batch, next: None }
    }

    fn resolved(batch: Mod, pool: PoolId, process: ProcessId, term: Term) -> Self {
        Self {
            batch,
            next: Some((pool, process, term)),
        }
    }
}

/// Run the transition for one checked term against its configuration.
pub(crate) async fn transition(
    port: &dyn PersistencePort,
    env: &Env,
    config: &Configuration,
    term: Term,
) -> Result<Outcome> {
    match &term {
        Term::Spawn { .. } | Term::Call { .. } => spawn(port, env, config, term).await,
        Term::Forward { .. } => forward(port, env, config, term).await,
        _ => communicate(port, env, config, term).await,
    }
}

/// Close/wait, send/receive, and label/case all follow the same shape: lock
/// the acting pool and process, then either record the half-done side or
/// resolve the rendezvous against the partner's stored record.
async fn communicate(
    port: &dyn PersistencePort,
    env: &Env,
    config: &Configuration,
    term: Term,
) -> Result<Outcome> {
    let endpoint = config.endpoint(term.via())?.clone();
    let channel = endpoint.channel;
    let mut batch = Mod::new();
    batch.lock(config.pool, config.pool_revision);
    batch.lock_process(config.process, config.process_revision);

    match config.pending.get(&channel) {
        None => {
            let record = half_done_record(&mut batch, env, config, &endpoint, &term)?;
            debug!(%channel, kind = record.kind(), "half-done, awaiting partner");
            batch.put_pending(channel, record);
            Ok(Outcome::suspended(batch))
        }
        Some(record) if matches!(record.term(), Term::Forward { .. }) => {
            resolve_stored_forward(port, config, &endpoint, term, record.clone(), batch).await
        }
        Some(record) => {
            rendezvous(port, env, config, &endpoint, term, record.clone(), batch).await
        }
    }
}

/// Build the record for a term that found no partner on its channel.
///
/// The offering side of send/label advances its own end here and captures
/// the advanced channels in the record, so the eventual rendezvous resolves
/// against the record and never against the offerer's later bindings. A sent
/// value leaves the sender in the same commit.
fn half_done_record(
    batch: &mut Mod,
    env: &Env,
    config: &Configuration,
    endpoint: &Endpoint,
    term: &Term,
) -> Result<PendingStep> {
    let offer = match term {
        Term::Close { .. } => None,
        Term::Send { value, .. } => {
            let value_ep = config.endpoint(value)?.clone();
            let (cont_channel, cont_type) =
                advance_offering_side(batch, env, config, endpoint, term)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                value_ep.placeholder.clone(),
                value_ep.granted_at,
            ));
            Some(Offer {
                cont_channel,
                cont_type,
                value: Some((value_ep.channel, value_ep.type_id)),
            })
        }
        Term::Label { .. } => {
            let (cont_channel, cont_type) =
                advance_offering_side(batch, env, config, endpoint, term)?;
            Some(Offer {
                cont_channel,
                cont_type,
                value: None,
            })
        }
        Term::Wait { .. } | Term::Receive { .. } | Term::Case { .. } => {
            return Ok(PendingStep::Service {
                pool: config.pool,
                process: config.process,
                term: term.clone(),
            })
        }
        other => {
            return Err(WeftError::unexpected_variant(format!(
                "{} cannot go half-done",
                other.kind()
            )))
        }
    };
    Ok(PendingStep::Message {
        pool: config.pool,
        process: config.process,
        term: term.clone(),
        offer,
    })
}

/// The channels captured when a stored message record went half-done.
fn record_offer(record: &PendingStep) -> Result<Offer> {
    record.offer().ok_or_else(|| {
        WeftError::unexpected_variant(format!(
            "stored {} record carries no advanced channels",
            record.kind()
        ))
    })
}

/// The offering side of send/label advances its own end as part of its step,
/// half-done or not: a fresh channel carries the continuation type and the
/// via placeholder is rebound onto it. Returns the fresh channel and the
/// continuation type.
fn advance_offering_side(
    batch: &mut Mod,
    env: &Env,
    config: &Configuration,
    endpoint: &Endpoint,
    term: &Term,
) -> Result<(ChannelId, TypeId)> {
    let node = env.resolve(endpoint.type_id)?;
    let cont_ty = match term {
        Term::Send { .. } => match node {
            weft_types::TypeNode::Tensor { cont, .. }
            | weft_types::TypeNode::Lolli { cont, .. } => *cont,
            other => {
                return Err(WeftError::unexpected_variant(format!(
                    "send against {} after checking",
                    other.kind()
                )))
            }
        },
        Term::Label { label, .. } => node.next(label).ok_or_else(|| {
            WeftError::unexpected_variant(format!("label '{label}' vanished after checking"))
        })?,
        other => {
            return Err(WeftError::unexpected_variant(format!(
                "{} does not advance a channel",
                other.kind()
            )))
        }
    };
    let fresh = ChannelId::new();
    batch.channel(fresh, endpoint.providing_pool);
    let revision = batch.next_revision(config.pool)?;
    batch.bind(BindingEvent::revoke(
        config.process,
        endpoint.placeholder.clone(),
        endpoint.granted_at,
    ));
    batch.bind(BindingEvent::grant(
        config.process,
        endpoint.placeholder.clone(),
        fresh,
        cont_ty,
        revision,
    ));
    Ok((fresh, cont_ty))
}

/// Resolve a rendezvous: the acting term meets the partner's stored term on
/// the same channel. The pair of kinds decides who continues.
async fn rendezvous(
    port: &dyn PersistencePort,
    env: &Env,
    config: &Configuration,
    endpoint: &Endpoint,
    term: Term,
    record: PendingStep,
    mut batch: Mod,
) -> Result<Outcome> {
    let channel = endpoint.channel;
    let partner = port.select_configuration(record.process()).await?;
    batch.lock(partner.pool, partner.pool_revision);
    batch.lock_process(partner.process, partner.process_revision);
    debug!(%channel, acting = term.kind(), stored = record.term().kind(), "rendezvous");

    match (&term, record.term()) {
        // The close arrives second: continue with the waiter's continuation.
        (Term::Close { .. }, Term::Wait { via: p_via, continuation }) => {
            let p_endpoint = partner.endpoint(p_via)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                endpoint.placeholder.clone(),
                endpoint.granted_at,
            ));
            batch.bind(BindingEvent::revoke(
                partner.process,
                p_endpoint.placeholder.clone(),
                p_endpoint.granted_at,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(
                batch,
                partner.pool,
                partner.process,
                (**continuation).clone(),
            ))
        }
        // The wait arrives second: continue with our own continuation.
        (Term::Wait { continuation, .. }, Term::Close { via: p_via }) => {
            let p_endpoint = partner.endpoint(p_via)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                endpoint.placeholder.clone(),
                endpoint.granted_at,
            ));
            batch.bind(BindingEvent::revoke(
                partner.process,
                p_endpoint.placeholder.clone(),
                p_endpoint.granted_at,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(
                batch,
                config.pool,
                config.process,
                (**continuation).clone(),
            ))
        }
        // The send arrives second: advance our end, hand the value and the
        // continuation channel to the receiver, continue its continuation.
        (
            Term::Send { value, .. },
            Term::Receive {
                via: p_via,
                bind,
                continuation,
            },
        ) => {
            let (fresh, cont_ty) = advance_offering_side(&mut batch, env, config, endpoint, &term)?;
            let value_ep = config.endpoint(value)?;
            let p_endpoint = partner.endpoint(p_via)?;
            let p_revision = batch.next_revision(partner.pool)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                value_ep.placeholder.clone(),
                value_ep.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                partner.process,
                bind.clone(),
                value_ep.channel,
                value_ep.type_id,
                p_revision,
            ));
            batch.bind(BindingEvent::revoke(
                partner.process,
                p_endpoint.placeholder.clone(),
                p_endpoint.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                partner.process,
                p_endpoint.placeholder.clone(),
                fresh,
                cont_ty,
                p_revision,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(
                batch,
                partner.pool,
                partner.process,
                (**continuation).clone(),
            ))
        }
        // The receive arrives second: the sender advanced its end and
        // released the value when it went half-done; resolve both against
        // the channels captured in the record. The sender may have kept
        // stepping and rebound its via since, so its live bindings say
        // nothing about this record.
        (
            Term::Receive {
                bind, continuation, ..
            },
            Term::Send { .. },
        ) => {
            let offer = record_offer(&record)?;
            let (value_channel, value_type) = offer.value.ok_or_else(|| {
                WeftError::unexpected_variant("stored send record carries no value")
            })?;
            let revision = batch.next_revision(config.pool)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                endpoint.placeholder.clone(),
                endpoint.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                config.process,
                endpoint.placeholder.clone(),
                offer.cont_channel,
                offer.cont_type,
                revision,
            ));
            batch.bind(BindingEvent::grant(
                config.process,
                bind.clone(),
                value_channel,
                value_type,
                revision,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(
                batch,
                config.pool,
                config.process,
                (**continuation).clone(),
            ))
        }
        // The label arrives second: select the acceptor's branch.
        (Term::Label { label, .. }, Term::Case { via: p_via, branches }) => {
            let (fresh, cont_ty) = advance_offering_side(&mut batch, env, config, endpoint, &term)?;
            let branch = Term::branch(branches, label).ok_or_else(|| {
                WeftError::unexpected_variant(format!(
                    "stored case lacks branch '{label}' after checking"
                ))
            })?;
            let p_endpoint = partner.endpoint(p_via)?;
            let p_revision = batch.next_revision(partner.pool)?;
            batch.bind(BindingEvent::revoke(
                partner.process,
                p_endpoint.placeholder.clone(),
                p_endpoint.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                partner.process,
                p_endpoint.placeholder.clone(),
                fresh,
                cont_ty,
                p_revision,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(batch, partner.pool, partner.process, branch))
        }
        // The case arrives second: the offerer advanced when it went
        // half-done; follow the channel captured in the record.
        (Term::Case { branches, .. }, Term::Label { label, .. }) => {
            let offer = record_offer(&record)?;
            let branch = Term::branch(branches, label).ok_or_else(|| {
                WeftError::unexpected_variant(format!(
                    "case lacks branch '{label}' after checking"
                ))
            })?;
            let revision = batch.next_revision(config.pool)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                endpoint.placeholder.clone(),
                endpoint.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                config.process,
                endpoint.placeholder.clone(),
                offer.cont_channel,
                offer.cont_type,
                revision,
            ));
            batch.remove_pending(channel);
            Ok(Outcome::resolved(batch, config.pool, config.process, branch))
        }
        (acting, stored) => Err(WeftError::unexpected_variant(format!(
            "{} met a stored {} on channel {channel}",
            acting.kind(),
            stored.kind()
        ))),
    }
}

/// The partner's stored record is a forward: rebind ourselves onto the
/// forward's target channel, consume the forwarder's two ends, and re-execute
/// our own term against the new channel.
async fn resolve_stored_forward(
    port: &dyn PersistencePort,
    config: &Configuration,
    endpoint: &Endpoint,
    term: Term,
    record: PendingStep,
    mut batch: Mod,
) -> Result<Outcome> {
    let (f_via, f_target) = match record.term() {
        Term::Forward { via, target } => (via.clone(), target.clone()),
        other => {
            return Err(WeftError::unexpected_variant(format!(
                "expected stored forward, found {}",
                other.kind()
            )))
        }
    };
    let forwarder = port.select_configuration(record.process()).await?;
    batch.lock(forwarder.pool, forwarder.pool_revision);
    batch.lock_process(forwarder.process, forwarder.process_revision);
    let f_endpoint = forwarder.endpoint(&f_via)?;
    let f_target_ep = forwarder.endpoint(&f_target)?;
    let revision = batch.next_revision(config.pool)?;
    debug!(
        channel = %endpoint.channel,
        target = %f_target_ep.channel,
        "resolving stored forward"
    );

    batch.bind(BindingEvent::revoke(
        config.process,
        endpoint.placeholder.clone(),
        endpoint.granted_at,
    ));
    batch.bind(BindingEvent::grant(
        config.process,
        endpoint.placeholder.clone(),
        f_target_ep.channel,
        f_target_ep.type_id,
        revision,
    ));
    batch.bind(BindingEvent::revoke(
        forwarder.process,
        f_endpoint.placeholder.clone(),
        f_endpoint.granted_at,
    ));
    batch.bind(BindingEvent::revoke(
        forwarder.process,
        f_target_ep.placeholder.clone(),
        f_target_ep.granted_at,
    ));
    batch.remove_pending(endpoint.channel);
    Ok(Outcome::resolved(batch, config.pool, config.process, term))
}

/// Forward identifies two channel ends as the same resource.
async fn forward(
    port: &dyn PersistencePort,
    env: &Env,
    config: &Configuration,
    term: Term,
) -> Result<Outcome> {
    let (via, target) = match &term {
        Term::Forward { via, target } => (via.clone(), target.clone()),
        other => {
            return Err(WeftError::unexpected_variant(format!(
                "forward transition on {}",
                other.kind()
            )))
        }
    };
    let via_ep = config.endpoint(&via)?.clone();
    let target_ep = config.endpoint(&target)?.clone();
    let mut batch = Mod::new();
    batch.lock(config.pool, config.pool_revision);
    batch.lock_process(config.process, config.process_revision);

    match config.pending.get(&via_ep.channel) {
        // A blocked offerer that already advanced off this channel left no
        // binding to rebind; its record moves to the target channel intact
        // and keeps waiting there.
        Some(record) if record.offer().is_some() => {
            let partner = port.select_configuration(record.process()).await?;
            batch.lock(partner.pool, partner.pool_revision);
            batch.lock_process(partner.process, partner.process_revision);
            batch.bind(BindingEvent::revoke(
                config.process,
                via_ep.placeholder.clone(),
                via_ep.granted_at,
            ));
            batch.bind(BindingEvent::revoke(
                config.process,
                target_ep.placeholder.clone(),
                target_ep.granted_at,
            ));
            batch.remove_pending(via_ep.channel);
            batch.put_pending(target_ep.channel, record.clone());
            Ok(Outcome::suspended(batch))
        }
        // A partner is already blocked on our channel: close the loop
        // immediately by rebinding it onto the target and continuing its
        // stored term. No new record is written.
        Some(record) => {
            let partner = port.select_configuration(record.process()).await?;
            batch.lock(partner.pool, partner.pool_revision);
            batch.lock_process(partner.process, partner.process_revision);
            let p_endpoint = partner
                .endpoint_for_channel(via_ep.channel)
                .ok_or_else(|| {
                    WeftError::unexpected_variant(format!(
                        "blocked process {} has no binding for channel {}",
                        partner.process, via_ep.channel
                    ))
                })?
                .clone();
            let p_revision = batch.next_revision(partner.pool)?;
            batch.bind(BindingEvent::revoke(
                config.process,
                via_ep.placeholder.clone(),
                via_ep.granted_at,
            ));
            batch.bind(BindingEvent::revoke(
                config.process,
                target_ep.placeholder.clone(),
                target_ep.granted_at,
            ));
            batch.bind(BindingEvent::revoke(
                partner.process,
                p_endpoint.placeholder.clone(),
                p_endpoint.granted_at,
            ));
            batch.bind(BindingEvent::grant(
                partner.process,
                p_endpoint.placeholder.clone(),
                target_ep.channel,
                target_ep.type_id,
                p_revision,
            ));
            batch.remove_pending(via_ep.channel);
            let resume = record.term().clone();
            Ok(Outcome::resolved(batch, partner.pool, partner.process, resume))
        }
        // Nobody is blocked yet: the forward itself becomes the half-done
        // record, on the side its polarity dictates.
        None => {
            let polarity = env.resolve(via_ep.type_id)?.polarity();
            let record = match polarity {
                Polarity::Positive => PendingStep::Message {
                    pool: config.pool,
                    process: config.process,
                    term: term.clone(),
                    offer: None,
                },
                Polarity::Negative => PendingStep::Service {
                    pool: config.pool,
                    process: config.process,
                    term: term.clone(),
                },
                Polarity::Neutral => {
                    return Err(WeftError::polarity_mismatch(
                        Polarity::Neutral.to_string(),
                        "positive or negative",
                    ))
                }
            };
            debug!(channel = %via_ep.channel, kind = record.kind(), "forward half-done");
            batch.put_pending(via_ep.channel, record);
            Ok(Outcome::suspended(batch))
        }
    }
}

/// Spawn and call always resolve synchronously in one step.
async fn spawn(
    port: &dyn PersistencePort,
    env: &Env,
    config: &Configuration,
    term: Term,
) -> Result<Outcome> {
    let (via, target_pool, callee, args, continuation) = match term {
        Term::Spawn {
            via,
            pool,
            callee,
            args,
            continuation,
        } => (via, pool, callee, args, Some(*continuation)),
        Term::Call {
            via,
            pool,
            callee,
            args,
        } => (via, pool, callee, args, None),
        other => {
            return Err(WeftError::unexpected_variant(format!(
                "spawn transition on {}",
                other.kind()
            )))
        }
    };
    let signature = env.signature(&callee)?.clone();
    let mut batch = Mod::new();
    batch.lock(config.pool, config.pool_revision);
    batch.lock_process(config.process, config.process_revision);
    let target = port.select_pool(target_pool).await?;
    batch.lock(target.pool, target.revision);
    let revision = batch.next_revision(config.pool)?;
    let target_revision = batch.next_revision(target.pool)?;

    let process = ProcessId::new();
    batch.process(ProcessRecord {
        process,
        pool: target.pool,
        revision: target_revision,
    });

    // The new providing endpoint, bound into both sides at the declared type.
    let fresh = ChannelId::new();
    batch.channel(fresh, target.pool);
    batch.bind(BindingEvent::grant(
        config.process,
        via,
        fresh,
        signature.provides_type,
        revision,
    ));
    batch.bind(BindingEvent::grant(
        process,
        signature.provides.clone(),
        fresh,
        signature.provides_type,
        target_revision,
    ));

    // Arguments move from the spawner into the callee, element-wise at the
    // declared parameter types.
    for (arg, param) in args.iter().zip(&signature.params) {
        let arg_ep = config.endpoint(arg)?;
        batch.bind(BindingEvent::revoke(
            config.process,
            arg_ep.placeholder.clone(),
            arg_ep.granted_at,
        ));
        batch.bind(BindingEvent::grant(
            process,
            param.placeholder.clone(),
            arg_ep.channel,
            param.type_id,
            target_revision,
        ));
    }
    debug!(callee = %signature.name, new_process = %process, "spawned");

    match continuation {
        Some(continuation) => Ok(Outcome::resolved(
            batch,
            config.pool,
            config.process,
            continuation,
        )),
        None => Ok(Outcome::suspended(batch)),
    }
}
