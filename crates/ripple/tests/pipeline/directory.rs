//! Named variables and the directory tree.

use super::{assert_error, assert_top};
use ripple::{Error, Session};

#[test]
fn store_recall_purge() {
    assert_top("42 'x' sto x", "42");
    assert_top("42 'x' sto 'x' rcl", "42");
    assert_top("1 'x' sto 2 'x' sto x", "2");
    assert_top("42 'x' sto 'x' purge x", "x");
    assert_error("'nope' rcl", Error::UndefinedName);
    assert_error("'nope' purge", Error::UndefinedName);
}

#[test]
fn text_names_work_too() {
    assert_top("7 \"t\" sto t", "7");
}

#[test]
fn vars_and_path() {
    assert_top("1 'a' sto 2 'b' sto vars", "{ a b }");
    assert_top("path", "{ HOME }");
}

#[test]
fn subdirectories() {
    let mut session = Session::new();
    session.eval("10 'x' sto 'sub' crdir").unwrap();
    session.runtime_mut().heap.dirs_mut().enter_subdir("sub");

    // Reads walk up to the parent; writes stay local.
    assert_eq!(session.eval("x").unwrap().last().unwrap(), "10");
    session.eval("20 'x' sto").unwrap();
    assert_eq!(session.eval("x").unwrap().last().unwrap(), "20");

    session.eval("home").unwrap();
    assert_eq!(session.eval("x").unwrap().last().unwrap(), "10");
}

#[test]
fn crdir_conflicts() {
    assert_error("'d' crdir 'd' crdir", Error::NameExists);
}

#[test]
fn pgdir_requires_empty() {
    let mut session = Session::new();
    session.eval("'d' crdir").unwrap();
    session.runtime_mut().heap.dirs_mut().enter_subdir("d");
    session.eval("1 'x' sto updir").unwrap();
    let err = session.eval("'d' pgdir").unwrap_err();
    assert_eq!(err.kind(), Error::Value);

    session.runtime_mut().heap.dirs_mut().enter_subdir("d");
    session.eval("'x' purge updir").unwrap();
    session.eval("'d' pgdir").unwrap();
    assert_error("'ghost' pgdir", Error::NoDirectory);
}

#[test]
fn stored_programs_run_by_name() {
    assert_top("« dup · » 'sq2' sto 9 sq2", "81");
}

#[test]
fn globals_survive_heavy_allocation() {
    let mut session = Session::new();
    session.eval("123456789 'keep' sto").unwrap();
    // A 1 KB blob recalled a few thousand times churns several heaps'
    // worth of temporaries.
    session
        .eval("\"0123456789ABCDEF\" 1 6 start dup + next 'blob' sto")
        .unwrap();
    session.eval("1 3000 for i blob drop next").unwrap();
    assert!(session.runtime().heap.gc_runs() > 0);
    assert_eq!(session.eval("keep").unwrap().last().unwrap(), "123456789");
}
