#[cfg(test)]
mod tests {
    use life_stepper::{CellSet, EngineAdapter, HashLifeEngine, NaiveEngine, Rule};
    use proptest::prelude::*;

    const SEED: u64 = 42;
    const FILL_RATE: f64 = 0.3;

    fn assert_sets_equal(naive: &CellSet, hash: &CellSet, context: &str) {
        if naive == hash {
            return;
        }
        let both: CellSet = naive.iter().chain(hash.iter()).collect();
        let Some(b) = both.bounds() else {
            return;
        };
        let (cx, cy) = naive
            .iter()
            .chain(hash.iter())
            .find(|&c| naive.contains(c) != hash.contains(c))
            .map_or((b.min_x, b.min_y), |c| (c.x, c.y));
        const K: i64 = 10;
        let mut picture = String::new();
        for y in cy - K..cy + K {
            picture.push('|');
            for set in [naive, hash] {
                picture.extend((cx - K..cx + K).map(|x| {
                    if set.contains((x, y).into()) {
                        '#'
                    } else {
                        ' '
                    }
                }));
                picture.push('|');
            }
            picture.push('\n');
        }
        panic!("Mismatch at ({cx}, {cy}) {context}:\n{picture}");
    }

    #[test]
    fn test_random_fields() {
        for side in [16, 50, 100] {
            let cells = CellSet::random(side, side, FILL_RATE, Some(SEED));
            let mut naive = NaiveEngine::new();
            let mut hash = HashLifeEngine::default();
            for generations in [1, 2, 5, 16, 33, 64] {
                let expected = naive.run(&cells, generations, &Rule::CONWAY).unwrap();
                let actual = hash.run(&cells, generations, &Rule::CONWAY).unwrap();
                assert_eq!(actual.generations, generations);
                assert_sets_equal(
                    &expected.cells,
                    &actual.cells,
                    &format!("side={side} generations={generations}"),
                );
            }
        }
    }

    #[test]
    fn test_consecutive_runs() {
        let mut state_naive = CellSet::random(64, 64, FILL_RATE, Some(SEED));
        let mut state_hash = state_naive.clone();
        let mut naive = NaiveEngine::new();
        let mut hash = HashLifeEngine::default();
        for i in 0..20 {
            state_naive = naive.run(&state_naive, 7, &Rule::CONWAY).unwrap().cells;
            state_hash = hash.run(&state_hash, 7, &Rule::CONWAY).unwrap().cells;
            assert_sets_equal(&state_naive, &state_hash, &format!("run={i}"));
        }
    }

    #[test]
    fn test_other_rules() {
        for rule in ["B36/S23", "B3678/S34678", "B2/S", "B3/S012345678"] {
            let rule: Rule = rule.parse().unwrap();
            let cells = CellSet::random(40, 40, FILL_RATE, Some(SEED));
            let expected = NaiveEngine::new().run(&cells, 24, &rule).unwrap();
            let actual = HashLifeEngine::default().run(&cells, 24, &rule).unwrap();
            assert_sets_equal(&expected.cells, &actual.cells, &format!("rule={rule}"));
        }
    }

    #[test]
    fn test_far_from_origin() {
        let glider: CellSet = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)].into_iter().collect();
        let far = glider.translated(-1 << 40, 1 << 40);
        let res = HashLifeEngine::default().run(&far, 400, &Rule::CONWAY).unwrap();
        assert_eq!(res.cells, glider.translated((-1 << 40) + 100, (1 << 40) + 100));
    }

    #[test]
    fn test_empty_and_dying() {
        let mut hash = HashLifeEngine::default();
        let res = hash.run(&CellSet::new(), 1000, &Rule::CONWAY).unwrap();
        assert!(res.cells.is_empty());
        assert_eq!(res.generations, 1000);

        let pair: CellSet = [(0, 0), (1, 0)].into_iter().collect();
        let res = hash.run(&pair, 77, &Rule::CONWAY).unwrap();
        assert!(res.cells.is_empty());
        assert_eq!(res.generations, 77);
    }

    #[test]
    fn test_patterns_far_apart() {
        let blinker: CellSet = [(0, 1), (1, 1), (2, 1)].into_iter().collect();
        let glider: CellSet = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)].into_iter().collect();
        for distance in [1 << 61, 1 << 62, i64::MAX - 100] {
            let cells: CellSet = blinker
                .iter()
                .chain(glider.translated(distance, 0).iter())
                .collect();
            let mut hash = HashLifeEngine::default();
            for generations in [1, 6, 40] {
                let expected = NaiveEngine::new().run(&cells, generations, &Rule::CONWAY).unwrap();
                let actual = hash.run(&cells, generations, &Rule::CONWAY).unwrap();
                assert_eq!(actual, expected, "distance={distance} generations={generations}");
            }
        }
    }

    #[test]
    fn test_whole_line_pattern() {
        let cells: CellSet = [(i64::MIN, 0), (i64::MAX, 0)].into_iter().collect();
        let res = HashLifeEngine::default().run(&cells, 1, &Rule::CONWAY).unwrap();
        assert_eq!(res.generations, 1);
        assert_eq!(res, NaiveEngine::new().run(&cells, 1, &Rule::CONWAY).unwrap());
    }

    #[test]
    fn test_wide_pattern_reports_partial_advance() {
        let block: CellSet = [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().collect();
        let cells: CellSet = block.iter().chain(block.translated(1 << 62, 0).iter()).collect();
        let res = HashLifeEngine::default().run(&cells, 5000, &Rule::CONWAY).unwrap();
        assert!(res.generations > 0 && res.generations < 5000);
        assert_eq!(res.cells, cells);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn engines_agree(
            cells in prop::collection::vec((-12i64..12, -12i64..12), 0..80),
            generations in 1u64..=20,
        ) {
            let cells: CellSet = cells.into_iter().collect();
            let expected = NaiveEngine::new().run(&cells, generations, &Rule::CONWAY).unwrap();
            let actual = HashLifeEngine::default().run(&cells, generations, &Rule::CONWAY).unwrap();
            prop_assert_eq!(actual, expected);
        }
    }
}
