mod common;

use common::{FakeDb, User, user_row};
use sessorm::{OrmError, OrmResult, Session, SessionConfig, SessionPool, values};
use std::time::Duration;

#[tokio::test]
async fn statements_outside_a_transaction_use_the_connector() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    session.exec("DELETE FROM `t`", &[]).await.unwrap();

    assert!(!session.in_transaction());
    assert!(!db.log()[0].in_tx);
    assert_eq!(db.begins(), 0);
}

#[tokio::test]
async fn run_in_transaction_commits_on_ok() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    let affected = session
        .run_in_transaction(|| async {
            assert!(session.in_transaction());
            let r = session.exec("UPDATE `t` SET `a`=?", &values![1]).await?;
            Ok(r.rows_affected)
        })
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert!(!session.in_transaction());
    assert!(db.log()[0].in_tx);
    assert_eq!((db.begins(), db.commits(), db.rollbacks()), (1, 1, 0));
}

#[tokio::test]
async fn run_in_transaction_rolls_back_and_returns_the_original_error() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    let err = session
        .run_in_transaction(|| async {
            session.exec("UPDATE `t` SET `a`=?", &values![1]).await?;
            Err::<(), _>(OrmError::validation("balance below zero"))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Validation(ref m) if m == "balance below zero"));
    assert!(!session.in_transaction());
    assert_eq!((db.begins(), db.commits(), db.rollbacks()), (1, 0, 1));
}

#[tokio::test]
async fn failed_commit_becomes_the_result() {
    let db = FakeDb::new();
    db.fail_commit();
    let session = Session::new(db.clone());

    let err = session
        .run_in_transaction(|| async {
            session.exec("UPDATE `t` SET `a`=?", &values![1]).await?;
            Ok(7)
        })
        .await
        .unwrap_err();

    assert!(err.is_driver_error());
    assert!(!session.in_transaction());
    assert_eq!((db.begins(), db.commits(), db.rollbacks()), (1, 1, 0));
}

#[tokio::test]
async fn nested_transactions_flatten_into_the_outermost() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    session
        .run_in_transaction(|| async {
            session
                .run_in_transaction(|| async {
                    session.exec("INSERT INTO `t`(`a`) VALUES(?)", &values![1]).await
                })
                .await?;
            // the inner call must not have committed
            assert!(session.in_transaction());
            session.exec("INSERT INTO `t`(`a`) VALUES(?)", &values![2]).await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!((db.begins(), db.commits(), db.rollbacks()), (1, 1, 0));
    assert!(db.log().iter().all(|l| l.in_tx));
}

#[tokio::test]
async fn inner_failure_rolls_back_the_whole_transaction() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    let result: OrmResult<()> = session
        .run_in_transaction(|| async {
            session.exec("INSERT INTO `t`(`a`) VALUES(?)", &values![1]).await?;
            session
                .run_in_transaction(|| async { Err::<(), _>(OrmError::Other("inner".into())) })
                .await?;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(OrmError::Other(ref m)) if m == "inner"));
    assert_eq!((db.begins(), db.commits(), db.rollbacks()), (1, 0, 1));
}

#[tokio::test]
async fn begin_while_active_is_ignored() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    session.begin_transaction().await.unwrap();
    session.begin_transaction().await.unwrap();
    assert_eq!(db.begins(), 1);

    session.commit_transaction().await.unwrap();
    assert!(!session.in_transaction());
    assert_eq!(db.commits(), 1);
}

#[tokio::test]
async fn commit_and_rollback_are_noops_when_idle() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    session.commit_transaction().await.unwrap();
    session.rollback_transaction().await.unwrap();
    assert_eq!((db.commits(), db.rollbacks()), (0, 0));
}

#[tokio::test]
async fn failed_begin_skips_the_body() {
    let db = FakeDb::new();
    db.fail_begin();
    let session = Session::new(db.clone());

    let err = session
        .run_in_transaction(|| async {
            session.exec("DELETE FROM `t`", &[]).await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_driver_error());
    assert!(db.log().is_empty());
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn transaction_macro_wraps_the_block() {
    let db = FakeDb::new();
    let session = Session::new(db.clone());

    let result: OrmResult<()> = sessorm::transaction!(session, {
        session.exec("UPDATE `a` SET `n`=`n`-?", &values![5]).await?;
        session.exec("UPDATE `b` SET `n`=`n`+?", &values![5]).await?;
        Ok(())
    });

    result.unwrap();
    assert_eq!(db.statements().len(), 2);
    assert_eq!((db.begins(), db.commits()), (1, 1));
}

#[tokio::test]
async fn deadline_times_out_slow_statements() {
    let db = FakeDb::new();
    db.set_delay(Duration::from_millis(200));
    let session = Session::new(db.clone());

    session.set_timeout(Duration::from_millis(20));
    let err = session.query("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_timeout());

    session.clear_deadline();
    db.set_delay(Duration::from_millis(1));
    assert!(session.query("SELECT 1", &[]).await.is_ok());
}

#[tokio::test]
async fn pool_release_rolls_back_and_clears_state() {
    let db = FakeDb::new();
    let pool = SessionPool::with_config(db.clone(), SessionConfig::new().with_max_idle_sessions(1));

    let session = pool.acquire();
    db.push_rows(vec![user_row(1, "alice", 0)]);
    session.dao::<User>().select(&values![1]).await.unwrap();
    session.begin_transaction().await.unwrap();
    assert_eq!(session.cached_records(), 1);

    pool.release(session).await;
    assert_eq!(db.rollbacks(), 1);
    assert_eq!(pool.idle_sessions(), 1);

    let recycled = pool.acquire();
    assert!(!recycled.in_transaction());
    assert_eq!(recycled.cached_records(), 0);
    assert_eq!(pool.idle_sessions(), 0);

    // over the idle limit: dropped instead of kept
    let extra = pool.acquire();
    pool.release(recycled).await;
    pool.release(extra).await;
    assert_eq!(pool.idle_sessions(), 1);
}
