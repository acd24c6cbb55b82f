mod integration {
    mod histogram {
        use windowed_quantiles::{calc_percentile_of_product, Histogram};

        const SAMPLE_LIST: [f64; 50] = [
            134.0, 3693.0, 1612.0, 2033.0, 1762.0, 669.0, 296.0, 567.0, 547.0, 935.0, 2842.0,
            3135.0, 645.0, 4265.0, 2267.0, 1170.0, 399.0, 635.0, 2153.0, 1836.0, 348.0, 2672.0,
            5318.0, 1662.0, 6104.0, 1057.0, 2900.0, 2777.0, 3715.0, 9208.0, 2231.0, 387.0, 1181.0,
            1063.0, 3092.0, 478.0, 2039.0, 781.0, 11764.0, 591.0, 271.0, 1061.0, 3182.0, 1470.0,
            4686.0, 1077.0, 1997.0, 2430.0, 18210.0, 2618.0,
        ];

        /// splitmix-style generator, reproducible across platforms.
        struct Xorshift {
            seed: u64,
        }

        impl Xorshift {
            fn new(seed: u64) -> Xorshift {
                Xorshift { seed }
            }

            fn next_val(&mut self) -> u32 {
                let z = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
                let nxt_seed = z;
                let z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                let z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                self.seed = nxt_seed;
                u32::from((z ^ (z >> 31)) as u16)
            }
        }

        fn uniform_values(seed: u64, n: usize) -> Vec<f64> {
            let mut rng = Xorshift::new(seed);
            (0..n)
                .map(|_| f64::from(rng.next_val() % 10_000) / 10.0)
                .collect()
        }

        #[test]
        fn sequential_data_hits_the_expected_ranks() {
            let hist = Histogram::new(10, 10.0, 1);
            for &p in &[0.25, 0.5, 0.75, 0.9] {
                hist.add_percentile_point(p);
            }
            for i in 1..=10 {
                hist.enqueue(f64::from(i), 1);
            }

            assert_eq!(hist.value_at_percentile(0.25), 2.0);
            assert_eq!(hist.value_at_percentile(0.5), 5.0);
            assert_eq!(hist.value_at_percentile(0.75), 7.0);
            assert_eq!(hist.value_at_percentile(0.9), 9.0);
            assert_eq!(hist.root_height(), 4);
            assert_eq!(hist.min_value(), Some(1.0));
            assert_eq!(hist.max_value(), Some(10.0));

            let snap = hist.percentile_snapshot(0.5).unwrap();
            assert_eq!(snap.value, Some(5.0));
            assert_eq!(snap.count, 5);
            assert_eq!(snap.real_percentage, 0.5);
        }

        #[test]
        fn sample_list_builds_the_expected_tree() {
            let hist = Histogram::new(0, 10.0, 1);
            hist.add_percentile_point(0.5);
            hist.add_percentile_point(0.9);
            for &v in SAMPLE_LIST.iter() {
                hist.enqueue(v, 1);
            }
            assert_eq!(hist.count(), 50);
            assert_eq!(hist.root_height(), 7);
            assert_eq!(hist.min_value(), Some(134.0));
            assert_eq!(hist.max_value(), Some(18210.0));
            assert_eq!(hist.percentile_for_value(18210.0), 1.0);
            assert_eq!(hist.percentile_for_value(134.0), 1.0 / 50.0);
        }

        #[test]
        fn draining_everything_returns_to_the_empty_state() {
            let hist = Histogram::new(0, 10.0, 1);
            hist.add_percentile_point(0.5);
            for &v in SAMPLE_LIST.iter() {
                hist.enqueue(v, 1);
            }
            for step in 0..50u64 {
                let evicted = hist.dequeue();
                assert_eq!(evicted, Some(SAMPLE_LIST[step as usize]));
                assert_eq!(hist.count(), 49 - step);
                if hist.count() > 0 {
                    assert!(hist.min_value().unwrap() <= hist.max_value().unwrap());
                    let snap = hist.percentile_snapshot(0.5).unwrap();
                    assert!(snap.value.is_some());
                }
            }
            assert_eq!(hist.count(), 0);
            assert_eq!(hist.root_height(), 0);
            assert!(hist.min_value().is_none());
            assert!(hist.max_value().is_none());
            assert_eq!(hist.mean(), 0.0);
            assert_eq!(hist.variance(), 0.0);
            assert_eq!(hist.dequeue(), None);
        }

        #[test]
        fn tied_samples_keep_the_cursor_saturated() {
            let hist = Histogram::new(100, 10.0, 1);
            hist.add_percentile_point(0.5);
            for _ in 0..50 {
                hist.enqueue(42.0, 1);
            }
            let snap = hist.percentile_snapshot(0.5).unwrap();
            assert_eq!(snap.value, Some(42.0));
            assert_eq!(snap.count, 50);
            assert_eq!(snap.real_percentage, 1.0);
            assert_eq!(hist.value_at_percentile(0.5), 42.0);
        }

        #[test]
        fn window_overflow_evicts_the_oldest() {
            let hist = Histogram::new(10, 10.0, 1);
            hist.add_percentile_point(0.5);
            for i in 0..15 {
                hist.enqueue(f64::from(i * 10), 1);
            }
            assert_eq!(hist.count(), 10);
            assert_eq!(hist.water_mark(), 1.0);
            assert_eq!(hist.min_value(), Some(50.0));
            assert_eq!(hist.max_value(), Some(140.0));
        }

        #[test]
        fn product_of_three_uniform_histograms() {
            let hists: Vec<Histogram> = [11u64, 22, 33]
                .iter()
                .map(|&seed| {
                    let h = Histogram::new(500, 10.0, 1);
                    h.add_percentile_point(0.95);
                    for v in uniform_values(seed, 500) {
                        h.enqueue(v, 1);
                    }
                    h
                })
                .collect();
            let refs: Vec<&Histogram> = hists.iter().collect();
            let v = calc_percentile_of_product(0.95, &refs, false);

            // prod F_i(v) ~ 0.95 means each uniform factor sits near
            // 0.95^(1/3) ~ 0.983, up to the discrete grid
            let target = 0.95f64.powf(1.0 / 3.0);
            for h in &hists {
                let f = h.percentile_for_value(v);
                assert!(
                    (f - target).abs() < 0.012,
                    "factor {} strays from {}",
                    f,
                    target
                );
            }
        }

        #[test]
        fn percentile_queries_on_empty_histograms_return_zero() {
            let hist = Histogram::new(100, 10.0, 1);
            hist.add_percentile_point(0.5);
            assert_eq!(hist.value_at_percentile(0.5), 0.0);
            assert_eq!(hist.percentile_for_value(123.0), 0.0);
            assert_eq!(hist.water_mark(), 0.0);
        }

        #[test]
        fn single_sample_answers_every_percentile() {
            let hist = Histogram::new(100, 10.0, 1);
            hist.add_percentile_point(0.5);
            hist.enqueue(42.0, 1);
            assert_eq!(hist.value_at_percentile(0.5), 42.0);
            assert_eq!(hist.min_value(), Some(42.0));
            assert_eq!(hist.max_value(), Some(42.0));
        }

        #[test]
        fn extreme_percentiles_stay_ordered() {
            let hist = Histogram::new(200, 10.0, 1);
            hist.add_percentile_point(0.001);
            hist.add_percentile_point(0.999);
            for v in uniform_values(5, 200) {
                hist.enqueue(v, 1);
            }
            let low = hist.value_at_percentile(0.001);
            let high = hist.value_at_percentile(0.999);
            assert!(low <= high);
        }

        #[test]
        fn untracked_percentile_falls_back_to_the_search() {
            let hist = Histogram::new(1000, 10.0, 1);
            for v in uniform_values(42, 1000) {
                hist.enqueue(v, 1);
            }
            let v = hist.value_at_percentile(0.9);
            let reached = hist.percentile_for_value(v);
            assert!((reached - 0.9).abs() < 0.02, "reached {}", reached);
        }

        #[test]
        fn unwindowed_histogram_never_evicts() {
            let hist = Histogram::new(0, 10.0, 1);
            for i in 0..5000 {
                assert_eq!(hist.enqueue(f64::from(i % 97), 1), None);
            }
            assert_eq!(hist.count(), 5000);
            assert_eq!(hist.water_mark(), 0.0);
        }
    }
}
