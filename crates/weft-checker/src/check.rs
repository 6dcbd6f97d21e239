//! Checking rules.
//!
//! `check_state` dispatches on whether the acting pool provides the term's
//! via channel; the same term kind means different things depending on role.
//! Recursion into continuations re-dispatches from the context itself, since
//! continuations may act on placeholders introduced during checking (a
//! received channel, a spawned callee) that the stored configuration does
//! not know yet.

use crate::context::{Context, Role};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::trace;
use weft_core::{Label, PoolId, Result, TypeId, WeftError};
use weft_types::{check_equal, Configuration, Env, Term, TypeNode, TypeStore};

/// Verify `term` against the linear context of the acting process.
///
/// The term's via must be bound in the configuration; the endpoint's
/// providing pool decides whether provider or client rules apply. Fails
/// without side effects; the stepper only mutates after this returns `Ok`.
pub fn check_state(
    acting_pool: PoolId,
    env: &Env,
    ctx: Context,
    config: &Configuration,
    term: &Term,
) -> Result<()> {
    // Spawn and call introduce their via channel themselves; every other
    // term must act on a channel the configuration already binds.
    if !matches!(term, Term::Spawn { .. } | Term::Call { .. }) {
        let endpoint = config.endpoint(term.via())?;
        trace!(
            via = %term.via(),
            kind = term.kind(),
            provider = endpoint.providing_pool == acting_pool,
            "checking term"
        );
    }
    check_term(env, ctx, term)
}

fn check_term(env: &Env, ctx: Context, term: &Term) -> Result<()> {
    // Spawning is issued by the client that wants a new callee; its via is
    // fresh, so there is no binding to dispatch on.
    if matches!(term, Term::Spawn { .. } | Term::Call { .. }) {
        return check_client(env, ctx, term);
    }
    match ctx.role(term.via())? {
        Role::Provider => check_provider(env, ctx, term),
        Role::Client => check_client(env, ctx, term),
    }
}

fn check_provider(env: &Env, mut ctx: Context, term: &Term) -> Result<()> {
    match term {
        Term::Close { via } => {
            let ty = ctx.take_liab(via)?;
            require_unit(env, ty)?;
            // Linearity: closing discharges the whole context.
            if !ctx.assets_empty() {
                return Err(WeftError::arity_mismatch(0, ctx.asset_count()));
            }
            Ok(())
        }
        // Providers never wait on their own offered channel.
        Term::Wait { .. } => Err(WeftError::type_mismatch("wait", "close")),
        Term::Send { via, value } => {
            let ty = ctx.liab(via)?;
            let (value_ty, cont_ty) = require_pair(env, ty, "tensor")?;
            let arg_ty = ctx.take_asset(value)?;
            check_equal(env, arg_ty, value_ty)?;
            ctx.set_liab(via, cont_ty);
            Ok(())
        }
        Term::Receive {
            via,
            bind,
            continuation,
        } => {
            let ty = ctx.liab(via)?;
            let (value_ty, cont_ty) = require_pair(env, ty, "lolli")?;
            ctx.bind_fresh_asset(bind, value_ty)?;
            ctx.set_liab(via, cont_ty);
            check_term(env, ctx, continuation)
        }
        Term::Label { via, label } => {
            let ty = ctx.liab(via)?;
            let choices = require_choices(env, ty, "plus")?;
            let cont_ty = select(&choices, label)?;
            ctx.set_liab(via, cont_ty);
            Ok(())
        }
        Term::Case { via, branches } => {
            let ty = ctx.liab(via)?;
            let choices = require_choices(env, ty, "with")?;
            check_branch_labels(&choices, branches)?;
            for branch in branches {
                let cont_ty = select(&choices, &branch.label)?;
                let mut branch_ctx = ctx.clone();
                branch_ctx.set_liab(via, cont_ty);
                check_term(env, branch_ctx, &branch.continuation)?;
            }
            Ok(())
        }
        Term::Forward { via, target } => {
            let liab_ty = ctx.take_liab(via)?;
            if ctx.asset_count() != 1 {
                return Err(WeftError::arity_mismatch(1, ctx.asset_count()));
            }
            let asset_ty = ctx.take_asset(target)?;
            let want = env.resolve(liab_ty)?.polarity();
            let got = env.resolve(asset_ty)?.polarity();
            if got != want {
                return Err(WeftError::polarity_mismatch(
                    got.to_string(),
                    want.to_string(),
                ));
            }
            check_equal(env, asset_ty, liab_ty)
        }
        // Routed to check_client before role dispatch; unreachable here.
        Term::Spawn { .. } => Err(WeftError::type_mismatch("spawn", "client-side action")),
        Term::Call { .. } => Err(WeftError::type_mismatch("call", "client-side action")),
    }
}

fn check_client(env: &Env, mut ctx: Context, term: &Term) -> Result<()> {
    match term {
        Term::Wait { via, continuation } => {
            let ty = ctx.take_asset(via)?;
            require_unit(env, ty)?;
            check_term(env, ctx, continuation)
        }
        // Clients never close a channel someone else provides.
        Term::Close { .. } => Err(WeftError::type_mismatch("close", "wait")),
        Term::Receive {
            via,
            bind,
            continuation,
        } => {
            // The shape of what a provider sends: the tensor's value arrives.
            let ty = ctx.asset(via)?;
            let (value_ty, cont_ty) = require_pair(env, ty, "tensor")?;
            ctx.bind_fresh_asset(bind, value_ty)?;
            ctx.set_asset(via, cont_ty);
            check_term(env, ctx, continuation)
        }
        Term::Send { via, value } => {
            let ty = ctx.asset(via)?;
            let (value_ty, cont_ty) = require_pair(env, ty, "lolli")?;
            let arg_ty = ctx.take_asset(value)?;
            check_equal(env, arg_ty, value_ty)?;
            ctx.set_asset(via, cont_ty);
            Ok(())
        }
        Term::Label { via, label } => {
            let ty = ctx.asset(via)?;
            let choices = require_choices(env, ty, "with")?;
            let cont_ty = select(&choices, label)?;
            ctx.set_asset(via, cont_ty);
            Ok(())
        }
        Term::Case { via, branches } => {
            let ty = ctx.asset(via)?;
            let choices = require_choices(env, ty, "plus")?;
            check_branch_labels(&choices, branches)?;
            for branch in branches {
                let cont_ty = select(&choices, &branch.label)?;
                let mut branch_ctx = ctx.clone();
                branch_ctx.set_asset(via, cont_ty);
                check_term(env, branch_ctx, &branch.continuation)?;
            }
            Ok(())
        }
        Term::Forward { .. } => Err(WeftError::type_mismatch("forward", "provider-side action")),
        Term::Spawn {
            via,
            callee,
            args,
            continuation,
            ..
        } => {
            let sig = env.signature(callee)?.clone();
            check_spawn_args(env, &mut ctx, args, &sig)?;
            ctx.bind_fresh_asset(via, sig.provides_type)?;
            check_term(env, ctx, continuation)
        }
        Term::Call {
            via, callee, args, ..
        } => {
            let sig = env.signature(callee)?.clone();
            check_spawn_args(env, &mut ctx, args, &sig)?;
            ctx.bind_fresh_asset(via, sig.provides_type)
        }
    }
}

fn check_spawn_args(
    env: &Env,
    ctx: &mut Context,
    args: &[weft_core::Placeholder],
    sig: &weft_types::Signature,
) -> Result<()> {
    if args.len() != sig.params.len() {
        return Err(WeftError::arity_mismatch(sig.params.len(), args.len()));
    }
    for (arg, param) in args.iter().zip(&sig.params) {
        let arg_ty = ctx.take_asset(arg)?;
        check_equal(env, arg_ty, param.type_id)?;
    }
    Ok(())
}

fn require_unit(env: &Env, ty: TypeId) -> Result<()> {
    match env.resolve(ty)? {
        TypeNode::Unit => Ok(()),
        node => Err(WeftError::type_mismatch(node.kind(), "unit")),
    }
}

fn require_pair(env: &Env, ty: TypeId, want: &'static str) -> Result<(TypeId, TypeId)> {
    match (env.resolve(ty)?, want) {
        (TypeNode::Tensor { value, cont }, "tensor")
        | (TypeNode::Lolli { value, cont }, "lolli") => Ok((*value, *cont)),
        (node, _) => Err(WeftError::type_mismatch(node.kind(), want)),
    }
}

fn require_choices(env: &Env, ty: TypeId, want: &'static str) -> Result<IndexMap<Label, TypeId>> {
    match (env.resolve(ty)?, want) {
        (TypeNode::Plus { choices }, "plus") | (TypeNode::With { choices }, "with") => {
            Ok(choices.clone())
        }
        (node, _) => Err(WeftError::type_mismatch(node.kind(), want)),
    }
}

fn select(choices: &IndexMap<Label, TypeId>, label: &Label) -> Result<TypeId> {
    choices.get(label).copied().ok_or_else(|| {
        WeftError::label_mismatch(choices.keys().cloned().collect(), label.clone())
    })
}

/// Branch labels must cover the choice set exactly once each; cardinality is
/// compared first for a precise size error, and a repeated label is a
/// mismatch even when the counts line up.
fn check_branch_labels(
    choices: &IndexMap<Label, TypeId>,
    branches: &[weft_types::Branch],
) -> Result<()> {
    if branches.len() != choices.len() {
        return Err(WeftError::arity_mismatch(choices.len(), branches.len()));
    }
    let mut seen = HashSet::with_capacity(branches.len());
    for branch in branches {
        if !choices.contains_key(&branch.label) || !seen.insert(&branch.label) {
            return Err(WeftError::label_mismatch(
                choices.keys().cloned().collect(),
                branch.label.clone(),
            ));
        }
    }
    Ok(())
}
