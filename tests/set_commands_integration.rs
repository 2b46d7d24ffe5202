//! Сквозные сценарии команд множеств через диспетчер.

use lavka::{dispatch, Reply, Sds, Server, Session, Settings, StoreError};

fn argv(parts: &[&str]) -> Vec<Sds> {
    parts.iter().map(|s| Sds::from_str(s)).collect()
}

fn run(
    srv: &mut Server,
    session: &mut Session,
    parts: &[&str],
) -> Reply {
    dispatch(srv, session, &argv(parts)).expect("command failed")
}

fn sorted_members(reply: Reply) -> Vec<String> {
    let Reply::Array(items) = reply else {
        panic!("expected array reply, got {reply:?}");
    };
    let mut out: Vec<String> = items
        .into_iter()
        .map(|r| match r {
            Reply::Bulk(s) => s.to_string(),
            other => panic!("expected bulk, got {other:?}"),
        })
        .collect();
    out.sort();
    out
}

fn encoding_of(
    srv: &Server,
    key: &str,
) -> &'static str {
    srv.dbs[0]
        .main
        .get(&Sds::from_str(key))
        .expect("key must exist")
        .encoding_name()
}

/// Числовое множество живёт в intset, нечисловой элемент переводит его в
/// hashtable, кардинальность сохраняется.
#[test]
fn scenario_intset_upgrade_on_non_integer() {
    let mut srv = Server::default();
    let mut session = Session::new();

    assert_eq!(
        run(&mut srv, &mut session, &["SADD", "s", "1", "2", "3", "4", "5"]),
        Reply::Int(5)
    );
    assert_eq!(encoding_of(&srv, "s"), "intset");

    assert_eq!(run(&mut srv, &mut session, &["SADD", "s", "foo"]), Reply::Int(1));
    assert_eq!(encoding_of(&srv, "s"), "hashtable");

    assert_eq!(run(&mut srv, &mut session, &["SCARD", "s"]), Reply::Int(6));
}

/// Порог set_max_intset_entries: пятый элемент при лимите 4 переводит
/// множество в hashtable.
#[test]
fn scenario_intset_upgrade_on_threshold() {
    let mut srv = Server::new(Settings {
        set_max_intset_entries: 4,
        ..Settings::default()
    });
    let mut session = Session::new();

    assert_eq!(
        run(&mut srv, &mut session, &["SADD", "s", "1", "2", "3", "4"]),
        Reply::Int(4)
    );
    assert_eq!(encoding_of(&srv, "s"), "intset");

    assert_eq!(run(&mut srv, &mut session, &["SADD", "s", "5"]), Reply::Int(1));
    assert_eq!(encoding_of(&srv, "s"), "hashtable");
    assert_eq!(run(&mut srv, &mut session, &["SCARD", "s"]), Reply::Int(5));
}

/// SINTERSTORE: пересечение хранится по ключу назначения в intset.
#[test]
fn scenario_sinterstore() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SADD", "a", "1", "2", "3"]);
    run(&mut srv, &mut session, &["SADD", "b", "2", "3", "4"]);

    assert_eq!(
        run(&mut srv, &mut session, &["SINTERSTORE", "c", "a", "b"]),
        Reply::Int(2)
    );
    assert_eq!(
        sorted_members(run(&mut srv, &mut session, &["SMEMBERS", "c"])),
        vec!["2", "3"]
    );
    assert_eq!(encoding_of(&srv, "c"), "intset");
}

/// SDIFF не зависит от выбранного алгоритма: большое вычитаемое множество
/// меняет селектор, но не результат.
#[test]
fn scenario_sdiff_algorithms() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SADD", "a", "1", "2", "3"]);
    run(&mut srv, &mut session, &["SADD", "b", "3", "4", "5"]);

    assert_eq!(
        sorted_members(run(&mut srv, &mut session, &["SDIFF", "a", "b"])),
        vec!["1", "2"]
    );

    let mut big = vec!["SADD".to_string(), "big".to_string()];
    big.extend((1000..1400).map(|i| i.to_string()));
    let big_refs: Vec<&str> = big.iter().map(|s| s.as_str()).collect();
    run(&mut srv, &mut session, &big_refs);

    assert_eq!(
        sorted_members(run(&mut srv, &mut session, &["SDIFF", "a", "b", "big"])),
        vec!["1", "2"]
    );
}

/// SPOP с количеством: возвращает различные бывшие элементы, удаляет
/// ровно их, транслируется как последовательность SREM.
#[test]
fn scenario_spop_with_count() {
    let mut srv = Server::default();
    let mut session = Session::new();
    let rec = lavka::RecordingHooks::default();
    srv.hooks.propagation = Box::new(rec.clone());

    let mut parts = vec!["SADD".to_string(), "s".to_string()];
    parts.extend((0..10).map(|i| i.to_string()));
    let refs: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();
    run(&mut srv, &mut session, &refs);

    let popped = sorted_members(run(&mut srv, &mut session, &["SPOP", "s", "3"]));
    assert_eq!(popped.len(), 3);

    // Различность и принадлежность исходному множеству.
    let mut uniq = popped.clone();
    uniq.dedup();
    assert_eq!(uniq.len(), 3);
    for p in &popped {
        let n: i64 = p.parse().unwrap();
        assert!((0..10).contains(&n));
        // Извлечённых больше нет в множестве.
        assert_eq!(
            run(&mut srv, &mut session, &["SISMEMBER", "s", p]),
            Reply::Int(0)
        );
    }
    assert_eq!(run(&mut srv, &mut session, &["SCARD", "s"]), Reply::Int(7));

    // Поток изменений: SADD целиком плюс три синтетических SREM, без SPOP.
    let prop = rec.propagated.lock().unwrap();
    assert_eq!(prop.len(), 4);
    assert_eq!(prop[0].argv[0], Sds::from_str("SADD"));
    for p in &prop[1..] {
        assert_eq!(p.argv[0], Sds::from_str("SREM"));
        assert_eq!(p.argv.len(), 3);
    }
}

/// SPOP всего множества транслируется одним DEL.
#[test]
fn scenario_spop_all_propagates_del() {
    let mut srv = Server::default();
    let mut session = Session::new();
    let rec = lavka::RecordingHooks::default();
    srv.hooks.propagation = Box::new(rec.clone());

    run(&mut srv, &mut session, &["SADD", "s", "a", "b", "c"]);
    let popped = sorted_members(run(&mut srv, &mut session, &["SPOP", "s", "100"]));
    assert_eq!(popped, vec!["a", "b", "c"]);
    assert_eq!(run(&mut srv, &mut session, &["EXISTS", "s"]), Reply::Int(0));

    let prop = rec.propagated.lock().unwrap();
    assert_eq!(prop.len(), 2);
    assert_eq!(prop[1].argv, argv(&["DEL", "s"]));
}

/// SMOVE: перенос элемента, источник удаляется при опустошении.
#[test]
fn scenario_smove() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SADD", "src", "only"]);
    run(&mut srv, &mut session, &["SADD", "dst", "x"]);

    assert_eq!(
        run(&mut srv, &mut session, &["SMOVE", "src", "dst", "only"]),
        Reply::Int(1)
    );
    assert_eq!(run(&mut srv, &mut session, &["EXISTS", "src"]), Reply::Int(0));
    assert_eq!(
        sorted_members(run(&mut srv, &mut session, &["SMEMBERS", "dst"])),
        vec!["only", "x"]
    );
}

/// SUNION объединяет, отсутствующие ключи — пустые множества.
#[test]
fn scenario_sunion() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SADD", "a", "1", "2"]);
    run(&mut srv, &mut session, &["SADD", "b", "2", "3"]);

    assert_eq!(
        sorted_members(run(&mut srv, &mut session, &["SUNION", "a", "missing", "b"])),
        vec!["1", "2", "3"]
    );
}

/// SRANDMEMBER: повторы допустимы только при отрицательном количестве.
#[test]
fn scenario_srandmember() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SADD", "s", "a", "b", "c"]);

    let Reply::Array(items) = run(&mut srv, &mut session, &["SRANDMEMBER", "s", "2"]) else {
        panic!("expected array");
    };
    assert_eq!(items.len(), 2);
    let mut uniq: Vec<&Reply> = items.iter().collect();
    uniq.sort_by_key(|r| format!("{r:?}"));
    uniq.dedup();
    assert_eq!(uniq.len(), 2);

    let Reply::Array(items) = run(&mut srv, &mut session, &["SRANDMEMBER", "s", "-10"]) else {
        panic!("expected array");
    };
    assert_eq!(items.len(), 10);

    // Множество нетронуто.
    assert_eq!(run(&mut srv, &mut session, &["SCARD", "s"]), Reply::Int(3));
}

/// Команда множества на строковом ключе — канонический WRONGTYPE.
#[test]
fn scenario_wrongtype() {
    let mut srv = Server::default();
    let mut session = Session::new();

    run(&mut srv, &mut session, &["SET", "k", "v"]);
    let err = dispatch(&mut srv, &mut session, &argv(&["SADD", "k", "x"])).unwrap_err();
    assert!(matches!(err, StoreError::WrongType));
    assert!(err.to_string().starts_with("WRONGTYPE"));
}

/// SSCAN с MATCH: полный проход собирает только подходящие элементы.
#[test]
fn scenario_sscan_with_match() {
    let mut srv = Server::default();
    let mut session = Session::new();

    let mut parts = vec!["SADD".to_string(), "s".to_string()];
    parts.extend((0..50).map(|i| format!("even{i}")));
    parts.extend((0..50).map(|i| format!("odd{i}")));
    let refs: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();
    run(&mut srv, &mut session, &refs);

    let mut seen = std::collections::HashSet::new();
    let mut cursor = "0".to_string();
    loop {
        let reply = run(
            &mut srv,
            &mut session,
            &["SSCAN", "s", &cursor, "MATCH", "even*", "COUNT", "20"],
        );
        let Reply::Array(parts) = reply else {
            panic!("expected array");
        };
        let Reply::Bulk(next) = &parts[0] else {
            panic!("expected cursor");
        };
        let Reply::Array(batch) = &parts[1] else {
            panic!("expected batch");
        };
        for r in batch {
            let Reply::Bulk(m) = r else { panic!("expected bulk") };
            seen.insert(m.to_string());
        }
        cursor = next.to_string();
        if cursor == "0" {
            break;
        }
    }

    assert_eq!(seen.len(), 50);
    assert!(seen.iter().all(|m| m.starts_with("even")));
}
