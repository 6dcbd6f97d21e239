//! Symmetric rendezvous: close/wait, send/receive, label/case, in both
//! arrival orders.

mod common;

use common::Fixture;
use weft_core::{Label, Placeholder};
use weft_engine::Stepper;
use weft_store::PersistencePort;
use weft_types::{Branch, PendingStep, Term, TypeSpec};

fn close(via: &str) -> Term {
    Term::Close {
        via: Placeholder::from(via),
    }
}

fn wait(via: &str, continuation: Term) -> Term {
    Term::Wait {
        via: Placeholder::from(via),
        continuation: Box::new(continuation),
    }
}

#[tokio::test]
async fn close_then_wait_resolves_and_runs_the_continuation() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let (pool_a, provider) = fx.pool_with_process().await;
    let (pool_b, client) = fx.pool_with_process().await;

    // Both processes share the channel the provider closes; the client also
    // provides its own channel to close afterwards.
    let shared = fx.provide(pool_a, pool_a, provider, "x", unit).await;
    fx.bind(pool_b, client, "y", shared, unit).await;
    let own = fx.provide(pool_b, pool_b, client, "z", unit).await;

    let stepper = Stepper::new(fx.port());
    stepper.take(pool_a, provider, close("x")).await.unwrap();
    assert!(matches!(
        fx.store.pending_for(shared),
        Some(PendingStep::Message { .. })
    ));

    stepper
        .take(pool_b, client, wait("y", close("z")))
        .await
        .unwrap();

    // The rendezvous consumed both ends and unblocked the continuation,
    // which went half-done on the client's own channel.
    assert!(fx.store.pending_for(shared).is_none());
    assert!(matches!(
        fx.store.pending_for(own),
        Some(PendingStep::Message { .. })
    ));
    let config = fx.store.select_configuration(client).await.unwrap();
    assert!(config.endpoint(&Placeholder::from("y")).is_err());
    assert!(config.endpoint(&Placeholder::from("z")).is_ok());
}

#[tokio::test]
async fn wait_then_close_converges_to_the_same_state() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let (pool_a, provider) = fx.pool_with_process().await;
    let (pool_b, client) = fx.pool_with_process().await;
    let shared = fx.provide(pool_a, pool_a, provider, "x", unit).await;
    fx.bind(pool_b, client, "y", shared, unit).await;
    let own = fx.provide(pool_b, pool_b, client, "z", unit).await;

    let stepper = Stepper::new(fx.port());
    stepper
        .take(pool_b, client, wait("y", close("z")))
        .await
        .unwrap();
    assert!(matches!(
        fx.store.pending_for(shared),
        Some(PendingStep::Service { .. })
    ));

    stepper.take(pool_a, provider, close("x")).await.unwrap();

    assert!(fx.store.pending_for(shared).is_none());
    assert!(matches!(
        fx.store.pending_for(own),
        Some(PendingStep::Message { .. })
    ));
}

#[tokio::test]
async fn send_then_receive_transfers_the_value_channel() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let tensor = fx
        .register(&TypeSpec::Tensor {
            value: Box::new(TypeSpec::Unit),
            cont: Box::new(TypeSpec::Unit),
        })
        .await;
    let (pool_a, sender) = fx.pool_with_process().await;
    let (pool_b, receiver) = fx.pool_with_process().await;
    let (pool_c, _) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, sender, "x", tensor).await;
    fx.bind(pool_b, receiver, "y", shared, tensor).await;
    // The value stays an asset for both sides: a third pool provides it.
    let value = fx.provide(pool_c, pool_a, sender, "m", unit).await;
    fx.provide(pool_b, pool_b, receiver, "z", unit).await;

    let stepper = Stepper::new(fx.port());
    stepper
        .take(
            pool_a,
            sender,
            Term::Send {
                via: Placeholder::from("x"),
                value: Placeholder::from("m"),
            },
        )
        .await
        .unwrap();

    // Half-done: the sender already advanced its own end.
    let sender_config = fx.store.select_configuration(sender).await.unwrap();
    let advanced = sender_config.endpoint(&Placeholder::from("x")).unwrap();
    assert_ne!(advanced.channel, shared);
    assert_eq!(
        fx.store.select_type(advanced.type_id).await.unwrap(),
        TypeSpec::Unit
    );

    stepper
        .take(
            pool_b,
            receiver,
            Term::Receive {
                via: Placeholder::from("y"),
                bind: Placeholder::from("w"),
                continuation: Box::new(wait("w", wait("y", close("z")))),
            },
        )
        .await
        .unwrap();

    // The receiver got the value under its binder and followed the sender
    // onto the fresh continuation channel; the continuation then blocked
    // waiting for the value channel to close.
    let receiver_config = fx.store.select_configuration(receiver).await.unwrap();
    let bound = receiver_config.endpoint(&Placeholder::from("w")).unwrap();
    assert_eq!(bound.channel, value);
    let followed = receiver_config.endpoint(&Placeholder::from("y")).unwrap();
    assert_eq!(followed.channel, advanced.channel);
    assert!(fx.store.pending_for(shared).is_none());
    assert!(matches!(
        fx.store.pending_for(value),
        Some(PendingStep::Service { .. })
    ));
    // The sender no longer holds the transferred value.
    let sender_config = fx.store.select_configuration(sender).await.unwrap();
    assert!(sender_config.endpoint(&Placeholder::from("m")).is_err());
}

#[tokio::test]
async fn receive_then_send_converges_to_the_same_state() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let tensor = fx
        .register(&TypeSpec::Tensor {
            value: Box::new(TypeSpec::Unit),
            cont: Box::new(TypeSpec::Unit),
        })
        .await;
    let (pool_a, sender) = fx.pool_with_process().await;
    let (pool_b, receiver) = fx.pool_with_process().await;
    let (pool_c, _) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, sender, "x", tensor).await;
    fx.bind(pool_b, receiver, "y", shared, tensor).await;
    let value = fx.provide(pool_c, pool_a, sender, "m", unit).await;
    fx.provide(pool_b, pool_b, receiver, "z", unit).await;

    let stepper = Stepper::new(fx.port());
    stepper
        .take(
            pool_b,
            receiver,
            Term::Receive {
                via: Placeholder::from("y"),
                bind: Placeholder::from("w"),
                continuation: Box::new(wait("w", wait("y", close("z")))),
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        fx.store.pending_for(shared),
        Some(PendingStep::Service { .. })
    ));

    stepper
        .take(
            pool_a,
            sender,
            Term::Send {
                via: Placeholder::from("x"),
                value: Placeholder::from("m"),
            },
        )
        .await
        .unwrap();

    let receiver_config = fx.store.select_configuration(receiver).await.unwrap();
    assert_eq!(
        receiver_config
            .endpoint(&Placeholder::from("w"))
            .unwrap()
            .channel,
        value
    );
    assert!(fx.store.pending_for(shared).is_none());
    assert!(matches!(
        fx.store.pending_for(value),
        Some(PendingStep::Service { .. })
    ));
}

#[tokio::test]
async fn label_selects_the_matching_case_branch() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let plus = fx
        .register(&TypeSpec::Plus {
            choices: [
                (Label::from("ok"), TypeSpec::Unit),
                (Label::from("err"), TypeSpec::Unit),
            ]
            .into_iter()
            .collect(),
        })
        .await;
    let (pool_a, offerer) = fx.pool_with_process().await;
    let (pool_b, acceptor) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, offerer, "x", plus).await;
    fx.bind(pool_b, acceptor, "y", shared, plus).await;
    fx.provide(pool_b, pool_b, acceptor, "z", unit).await;

    let case = Term::Case {
        via: Placeholder::from("y"),
        branches: vec![
            Branch {
                label: Label::from("ok"),
                continuation: wait("y", close("z")),
            },
            Branch {
                label: Label::from("err"),
                continuation: Term::Forward {
                    via: Placeholder::from("z"),
                    target: Placeholder::from("y"),
                },
            },
        ],
    };

    let stepper = Stepper::new(fx.port());
    stepper
        .take(
            pool_a,
            offerer,
            Term::Label {
                via: Placeholder::from("x"),
                label: Label::from("ok"),
            },
        )
        .await
        .unwrap();
    stepper.take(pool_b, acceptor, case).await.unwrap();

    // The "ok" branch ran: the acceptor is blocked waiting on the offerer's
    // advanced continuation channel.
    let offerer_config = fx.store.select_configuration(offerer).await.unwrap();
    let advanced = offerer_config.endpoint(&Placeholder::from("x")).unwrap();
    assert_ne!(advanced.channel, shared);
    assert!(fx.store.pending_for(shared).is_none());
    let record = fx.store.pending_for(advanced.channel).unwrap();
    assert_eq!(record.term().kind(), "wait");
}

#[tokio::test]
async fn case_then_label_converges_to_the_same_state() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let plus = fx
        .register(&TypeSpec::Plus {
            choices: [
                (Label::from("ok"), TypeSpec::Unit),
                (Label::from("err"), TypeSpec::Unit),
            ]
            .into_iter()
            .collect(),
        })
        .await;
    let (pool_a, offerer) = fx.pool_with_process().await;
    let (pool_b, acceptor) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, offerer, "x", plus).await;
    fx.bind(pool_b, acceptor, "y", shared, plus).await;
    fx.provide(pool_b, pool_b, acceptor, "z", unit).await;

    let case = Term::Case {
        via: Placeholder::from("y"),
        branches: vec![
            Branch {
                label: Label::from("ok"),
                continuation: wait("y", close("z")),
            },
            Branch {
                label: Label::from("err"),
                continuation: Term::Forward {
                    via: Placeholder::from("z"),
                    target: Placeholder::from("y"),
                },
            },
        ],
    };

    let stepper = Stepper::new(fx.port());
    stepper.take(pool_b, acceptor, case).await.unwrap();
    assert!(matches!(
        fx.store.pending_for(shared),
        Some(PendingStep::Service { .. })
    ));

    stepper
        .take(
            pool_a,
            offerer,
            Term::Label {
                via: Placeholder::from("x"),
                label: Label::from("ok"),
            },
        )
        .await
        .unwrap();

    let offerer_config = fx.store.select_configuration(offerer).await.unwrap();
    let advanced = offerer_config.endpoint(&Placeholder::from("x")).unwrap();
    assert!(fx.store.pending_for(shared).is_none());
    let record = fx.store.pending_for(advanced.channel).unwrap();
    assert_eq!(record.term().kind(), "wait");
}

#[tokio::test]
async fn pipelined_sends_resolve_in_order() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let tensor2 = fx
        .register(&TypeSpec::Tensor {
            value: Box::new(TypeSpec::Unit),
            cont: Box::new(TypeSpec::Tensor {
                value: Box::new(TypeSpec::Unit),
                cont: Box::new(TypeSpec::Unit),
            }),
        })
        .await;
    let (pool_a, sender) = fx.pool_with_process().await;
    let (pool_b, receiver) = fx.pool_with_process().await;
    let (pool_c, _) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, sender, "x", tensor2).await;
    fx.bind(pool_b, receiver, "y", shared, tensor2).await;
    let m1 = fx.provide(pool_c, pool_a, sender, "m1", unit).await;
    let m2 = fx.provide(pool_c, pool_a, sender, "m2", unit).await;
    fx.provide(pool_b, pool_b, receiver, "z", unit).await;

    // The sender issues both sends before the receiver shows up, rebinding
    // its via onto a fresh channel each time.
    let stepper = Stepper::new(fx.port());
    for value in ["m1", "m2"] {
        stepper
            .take(
                pool_a,
                sender,
                Term::Send {
                    via: Placeholder::from("x"),
                    value: Placeholder::from(value),
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(fx.store.pending_channels().len(), 2);

    stepper
        .take(
            pool_b,
            receiver,
            Term::Receive {
                via: Placeholder::from("y"),
                bind: Placeholder::from("w1"),
                continuation: Box::new(Term::Receive {
                    via: Placeholder::from("y"),
                    bind: Placeholder::from("w2"),
                    continuation: Box::new(wait(
                        "w1",
                        wait("w2", wait("y", close("z"))),
                    )),
                }),
            },
        )
        .await
        .unwrap();

    // Both records resolved in order: the receiver holds each value under
    // its binder and followed the sender onto its final channel.
    let receiver_config = fx.store.select_configuration(receiver).await.unwrap();
    assert_eq!(
        receiver_config
            .endpoint(&Placeholder::from("w1"))
            .unwrap()
            .channel,
        m1
    );
    assert_eq!(
        receiver_config
            .endpoint(&Placeholder::from("w2"))
            .unwrap()
            .channel,
        m2
    );
    let sender_config = fx.store.select_configuration(sender).await.unwrap();
    assert_eq!(
        receiver_config
            .endpoint(&Placeholder::from("y"))
            .unwrap()
            .channel,
        sender_config
            .endpoint(&Placeholder::from("x"))
            .unwrap()
            .channel
    );
    assert!(sender_config.endpoint(&Placeholder::from("m1")).is_err());
    assert!(sender_config.endpoint(&Placeholder::from("m2")).is_err());
    // The only remaining record is the continuation blocked on m1.
    assert_eq!(fx.store.pending_channels(), vec![m1]);
    assert_eq!(fx.store.pending_for(m1).unwrap().term().kind(), "wait");
}

#[tokio::test]
async fn pipelined_labels_resolve_in_order() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let plus2 = fx
        .register(&TypeSpec::Plus {
            choices: [
                (
                    Label::from("more"),
                    TypeSpec::Plus {
                        choices: [
                            (Label::from("stop"), TypeSpec::Unit),
                            (Label::from("done"), TypeSpec::Unit),
                        ]
                        .into_iter()
                        .collect(),
                    },
                ),
                (Label::from("done"), TypeSpec::Unit),
            ]
            .into_iter()
            .collect(),
        })
        .await;
    let (pool_a, offerer) = fx.pool_with_process().await;
    let (pool_b, acceptor) = fx.pool_with_process().await;

    let shared = fx.provide(pool_a, pool_a, offerer, "x", plus2).await;
    fx.bind(pool_b, acceptor, "y", shared, plus2).await;
    fx.provide(pool_b, pool_b, acceptor, "z", unit).await;

    let stepper = Stepper::new(fx.port());
    for label in ["more", "stop"] {
        stepper
            .take(
                pool_a,
                offerer,
                Term::Label {
                    via: Placeholder::from("x"),
                    label: Label::from(label),
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(fx.store.pending_channels().len(), 2);

    let leaf = || wait("y", close("z"));
    let case = Term::Case {
        via: Placeholder::from("y"),
        branches: vec![
            Branch {
                label: Label::from("more"),
                continuation: Term::Case {
                    via: Placeholder::from("y"),
                    branches: vec![
                        Branch {
                            label: Label::from("stop"),
                            continuation: leaf(),
                        },
                        Branch {
                            label: Label::from("done"),
                            continuation: leaf(),
                        },
                    ],
                },
            },
            Branch {
                label: Label::from("done"),
                continuation: leaf(),
            },
        ],
    };
    stepper.take(pool_b, acceptor, case).await.unwrap();

    // Both selections resolved in order and the continuation blocked on the
    // offerer's final channel.
    let offerer_config = fx.store.select_configuration(offerer).await.unwrap();
    let final_channel = offerer_config
        .endpoint(&Placeholder::from("x"))
        .unwrap()
        .channel;
    let acceptor_config = fx.store.select_configuration(acceptor).await.unwrap();
    assert_eq!(
        acceptor_config
            .endpoint(&Placeholder::from("y"))
            .unwrap()
            .channel,
        final_channel
    );
    assert_eq!(fx.store.pending_channels(), vec![final_channel]);
    assert_eq!(
        fx.store.pending_for(final_channel).unwrap().term().kind(),
        "wait"
    );
}

#[tokio::test]
async fn at_most_one_pending_record_per_channel() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let (pool_a, provider) = fx.pool_with_process().await;
    let shared = fx.provide(pool_a, pool_a, provider, "x", unit).await;

    let stepper = Stepper::new(fx.port());
    stepper.take(pool_a, provider, close("x")).await.unwrap();
    assert_eq!(fx.store.pending_channels(), vec![shared]);

    // A second half-done step on the same channel cannot slip in.
    let err = stepper.take(pool_a, provider, close("x")).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(fx.store.pending_channels(), vec![shared]);
}
