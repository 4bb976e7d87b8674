use abc_sim::{Expr, Instr, Interpreter, Model, Program, SimConfig, SlotId};
use pretty_assertions::assert_eq;
use test_log::test;

fn idx(m: &Model, slot: SlotId) -> usize {
    m.index_of(slot).unwrap() as usize
}

#[test]
fn duck_or_frog() {
    let mut m = Model::new();
    let quacks = m.input("quacks") as usize;
    let flies = m.input("flies") as usize;
    let swims = m.input("swims") as usize;
    let croaks = m.input("croaks") as usize;
    assert_eq!((quacks, flies, swims, croaks), (0, 1, 2, 3));

    let (q, f, s, c) = (m.slot("quacks"), m.slot("flies"), m.slot("swims"), m.slot("croaks"));
    let duck = m.slot("duck");
    let frog = m.slot("frog");
    m.assign(duck, q & (f | s)).unwrap();
    m.assign(frog, c & s & !f).unwrap();

    let mut sim = Interpreter::new(m.compile().unwrap()).unwrap();
    let state = sim.tick();
    assert_eq!(state[idx(&m, duck)], 0);
    assert_eq!(state[idx(&m, frog)], 0);

    sim.poke(quacks, 0).unwrap();
    sim.poke(flies, 0).unwrap();
    sim.poke(swims, 1).unwrap();
    sim.poke(croaks, 1).unwrap();

    let state = sim.tick();
    assert_eq!(state[idx(&m, duck)], 0);
    assert_eq!(state[idx(&m, frog)], 1);
}

#[test]
fn two_inputs_one_gate_bytecode() {
    let mut m = Model::new();
    m.input("in1");
    m.input("in2");
    let (a, b) = (m.slot("in1"), m.slot("in2"));
    let out = m.slot("out");
    m.assign(out, a & b).unwrap();

    let program = m.compile().unwrap();
    assert_eq!(program.size(), 3);
    assert_eq!(
        program.instructions(),
        &[Instr::Load(0), Instr::Load(1), Instr::And, Instr::Store(2)]
    );

    // Persisted bytes reload into an identical program
    let reloaded = Program::from_bytes(program.as_bytes().to_vec()).unwrap();
    assert_eq!(reloaded, program);
}

#[test]
fn shared_subexpression_matches_single_use() {
    let mut m = Model::new();
    let inputs: Vec<usize> = ["x", "y", "z"].iter().map(|n| m.input(*n) as usize).collect();
    let (x, y, z) = (m.slot("x"), m.slot("y"), m.slot("z"));

    let a = (x ^ y) | !z;
    let single = m.slot("single");
    let doubled = m.slot("doubled");
    m.assign(single, &a).unwrap();
    m.assign(doubled, &a & &a).unwrap();

    let program = m.compile().unwrap();
    let mut sim = Interpreter::new(program).unwrap();
    for bits in 0..8u64 {
        for (i, &input) in inputs.iter().enumerate() {
            sim.poke(input, (bits >> i) & 1).unwrap();
        }
        let state = sim.tick();
        assert_eq!(
            state[idx(&m, single)],
            state[idx(&m, doubled)],
            "inputs {bits:03b}"
        );
    }
}

#[test]
fn self_copied_inputs_drive_many_outputs() {
    let mut it = Model::new();
    for name in ["quacks", "flies", "swims", "croaks"] {
        let slot = it.slot(name);
        it.assign(slot, Expr::from(slot)).unwrap();
    }
    let (q, f, s) = (it.slot("quacks"), it.slot("flies"), it.slot("swims"));
    let duck = it.slot("duck");
    for i in 0..1000 {
        let d = it.child(duck, i);
        it.assign(d, q & (f | s)).unwrap();
    }

    let program = it.compile().unwrap();
    assert_eq!(program.size(), 1004);
    let mut sim = Interpreter::new(program).unwrap();
    sim.poke(idx(&it, q), 1).unwrap();
    sim.poke(idx(&it, s), 1).unwrap();

    let state = sim.run_ticks(2).to_vec();
    for i in 0..1000 {
        let d = it.child(duck, i);
        assert_eq!(state[idx(&it, d)], 1);
    }
    assert_eq!(state[idx(&it, q)], 1);
}

const SIZE: i64 = 6;
const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

fn cell(m: &mut Model, x: i64, y: i64) -> SlotId {
    let root = m.root();
    m.path(root, [x.rem_euclid(SIZE), y.rem_euclid(SIZE)])
}

fn token(m: &mut Model, i: i64) -> SlotId {
    let t = m.slot("t");
    m.child(t, i.rem_euclid(10))
}

/// Game of life on a torus, one generation every ten ticks
///
/// A token circulates through `t[0..10]`. While it sits on `t[1..=8]` each
/// cell samples one neighbour into `hit` and counts hits in `c[1..=4]`;
/// when it reaches `t[0]` the cells update and the counters clear.
fn life_model() -> Model {
    let mut b = Model::new();
    for i in 0..10 {
        let ti = token(&mut b, i);
        let prev = token(&mut b, i - 1);
        b.assign(ti, Expr::from(prev)).unwrap();
    }

    for x in 0..SIZE {
        for y in 0..SIZE {
            let mut hits = Vec::new();
            for (i, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let n = cell(&mut b, x + dx, y + dy);
                let ti = token(&mut b, i as i64 + 1);
                hits.push(n & ti);
            }

            let cur = cell(&mut b, x, y);
            let hit = b.child(cur, "hit");
            let any = hits.into_iter().reduce(|acc, e| acc | e).unwrap();
            b.assign(hit, any).unwrap();

            let counters = b.child(cur, "c");
            let c: Vec<SlotId> = (1..=4).map(|k| b.child(counters, k)).collect();
            let t0 = token(&mut b, 0);
            b.assign(c[0], !t0 & (c[0] | hit)).unwrap();
            for k in 1..4 {
                b.assign(c[k], !t0 & (c[k] | c[k - 1] & hit)).unwrap();
            }

            let next = !t0 & cur | t0 & !c[3] & (cur & (c[1] | c[2]) | !cur & c[2]);
            b.assign(cur, next).unwrap();
        }
    }
    b
}

fn live_cells(m: &mut Model, state: &[u64]) -> Vec<(i64, i64)> {
    let mut live = Vec::new();
    for x in 0..SIZE {
        for y in 0..SIZE {
            let slot = cell(m, x, y);
            if state[idx(m, slot)] & 1 == 1 {
                live.push((x, y));
            }
        }
    }
    live
}

#[test]
fn token_ring_advances_one_step_per_tick() {
    let mut m = life_model();
    let program = m.compile().unwrap();
    let mut sim = Interpreter::new(program).unwrap();
    let t1 = token(&mut m, 1);
    sim.poke(idx(&m, t1), 1).unwrap();

    for step in 1..=25 {
        let state = sim.tick().to_vec();
        for i in 0..10 {
            let ti = token(&mut m, i);
            let expected = u64::from(i == (1 + step) % 10);
            assert_eq!(state[idx(&m, ti)], expected, "t[{i}] after {step} ticks");
        }
    }
}

#[test]
fn life_blinker_oscillates() {
    let mut m = life_model();
    let program = m.compile().unwrap();
    let mut sim = Interpreter::with_config(program, &SimConfig::default()).unwrap();

    let t1 = token(&mut m, 1);
    sim.poke(idx(&m, t1), 1).unwrap();
    for y in 1..=3 {
        let slot = cell(&mut m, 2, y);
        sim.poke(idx(&m, slot), 1).unwrap();
    }

    let state = sim.run_ticks(10).to_vec();
    assert_eq!(live_cells(&mut m, &state), vec![(1, 2), (2, 2), (3, 2)]);

    let state = sim.run_ticks(10).to_vec();
    assert_eq!(live_cells(&mut m, &state), vec![(2, 1), (2, 2), (2, 3)]);
}

#[test]
fn indices_are_dense_and_match_header() {
    let m = life_model();
    let program = m.compile().unwrap();
    let mut indices: Vec<u32> = m.symbols().into_values().collect();
    indices.sort_unstable();
    let expected: Vec<u32> = (0..program.size()).collect();
    assert_eq!(indices, expected);
    // 10 tokens, plus per cell: itself, hit and four counters
    assert_eq!(program.size() as i64, 10 + SIZE * SIZE * 6);
}
