//! Statement-cache scenarios exercised through the public `StatementCaches`
//! surface, across more than one kind at a time.

use respool::statement_cache::{RawStatement, StatementCaches, StatementKind, StatementTriple};

struct FakeStmt {
    sql: &'static str,
    closed: bool,
}

impl RawStatement for FakeStmt {
    fn recycle(&mut self) -> respool::Result<()> {
        Ok(())
    }

    fn close_raw(&mut self) {
        self.closed = true;
    }
}

#[test]
fn simple_and_parameterized_kinds_are_independent_caches() {
    let caches = StatementCaches::<FakeStmt>::new(true);
    let triple = StatementTriple::default();

    let simple = caches
        .sub_cache(StatementKind::Simple)
        .acquire(None, triple, true, || {
            Ok(FakeStmt { sql: "select 1", closed: false })
        })
        .unwrap();
    let parameterized = caches
        .sub_cache(StatementKind::Parameterized)
        .acquire(Some("select ? from t".into()), triple, true, || {
            Ok(FakeStmt { sql: "select ? from t", closed: false })
        })
        .unwrap();

    let used = caches.all_used();
    assert_eq!(used.len(), 2);
    assert!(used.contains(&(StatementKind::Simple, simple.id)));
    assert!(used.contains(&(StatementKind::Parameterized, parameterized.id)));

    caches.sub_cache(StatementKind::Simple).release(simple.id, simple.raw);
    caches
        .sub_cache(StatementKind::Parameterized)
        .release(parameterized.id, parameterized.raw);

    // Each kind's free sequence holds only its own statement back.
    let reacquired_simple = caches
        .sub_cache(StatementKind::Simple)
        .acquire(None, triple, true, || panic!("simple should have been cached"))
        .unwrap();
    assert_eq!(reacquired_simple.raw.sql, "select 1");

    assert_eq!(caches.all_used().len(), 1);
}

#[test]
fn closing_a_connection_destroys_every_free_statement_across_kinds() {
    let caches = StatementCaches::<FakeStmt>::new(true);
    let triple = StatementTriple::default();

    let a = caches
        .sub_cache(StatementKind::Simple)
        .acquire(None, triple, true, || Ok(FakeStmt { sql: "a", closed: false }))
        .unwrap();
    caches.sub_cache(StatementKind::Simple).release(a.id, a.raw);

    let b = caches
        .sub_cache(StatementKind::Callable)
        .acquire(Some("{call p()}".into()), triple, true, || {
            Ok(FakeStmt { sql: "b", closed: false })
        })
        .unwrap();
    caches.sub_cache(StatementKind::Callable).release(b.id, b.raw);

    let drained = caches.drain_all_free();
    assert_eq!(drained.len(), 2);
    assert!(caches.all_used().is_empty());
}
