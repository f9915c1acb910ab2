// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Kernel throughput per precision tier.  Each tier iterates random
//! points near the origin in growing batches until one batch takes at
//! least the requested time, then reports iterations per millisecond.

extern crate clap;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate log;
extern crate mandelzoom;
extern crate rand;

use clap::{App, Arg, ArgMatches};
use mandelzoom::escape::{iterate, LIMIT};
use mandelzoom::{Scalar, Tier, TierVisitor};
use rand::Rng;
use std::str::FromStr;
use std::time::Instant;

const DURATION: &str = "duration";
const TIERS: &str = "tiers";

const INNER_ITERATIONS: u64 = 32_768;

fn args<'a>() -> ArgMatches<'a> {
    App::new("tierbench")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Escape-time kernel throughput for each precision tier")
        .arg(
            Arg::with_name(DURATION)
                .required(false)
                .long(DURATION)
                .short("d")
                .takes_value(true)
                .default_value("1000")
                .validator(|s| match u64::from_str(&s) {
                    Ok(ms) if ms >= 1 && ms <= 60_000 => Ok(()),
                    Ok(_) => Err("Duration must be between 1 and 60000 ms".to_string()),
                    Err(_) => Err("Could not parse duration".to_string()),
                })
                .help("Minimum milliseconds per measurement"),
        )
        .arg(
            Arg::with_name(TIERS)
                .required(false)
                .multiple(true)
                .validator(|s| s.parse::<Tier>().map(|_| ()).map_err(|e| e.to_string()))
                .help("Tiers to measure; all of them when omitted"),
        )
        .get_matches()
}

// Halve until adding it to one changes nothing.
fn measured_epsilon<T: Scalar>() -> f64 {
    let one = T::from_f64(1.0);
    let half = T::from_f64(0.5);
    let mut epsilon = T::from_f64(1.0);
    while one.clone() + half.clone() * epsilon.clone() != one {
        epsilon = half.clone() * epsilon;
    }
    epsilon.to_f64()
}

struct Measurement {
    batches: u64,
    millis: u64,
    mean: u64,
}

fn measure<T: Scalar, R: Rng>(rng: &mut R, min_duration: u64) -> Measurement {
    let mut batches: u64 = 16;
    loop {
        let mut sum: u64 = 0;
        let start = Instant::now();
        for _ in 0..batches * INNER_ITERATIONS {
            let x = T::from_f64(rng.gen_range(0.01..0.11));
            let y = T::from_f64(rng.gen_range(0.01..0.11));
            sum += u64::from(iterate(&x, &y, LIMIT).iterations);
        }
        let millis = start.elapsed().as_millis() as u64;
        if millis >= min_duration {
            return Measurement {
                batches,
                millis,
                mean: sum / batches,
            };
        }
        batches = if millis <= 8 {
            batches * 8
        } else {
            ((batches * min_duration * 5 / millis) / 4).max(batches + 1)
        };
        debug!("retrying with {} batches", batches);
    }
}

struct Benchmark<'a, R> {
    tier: Tier,
    rng: &'a mut R,
    min_duration: u64,
}

impl<'a, R: Rng> TierVisitor for Benchmark<'a, R> {
    type Output = ();

    fn visit<T: Scalar>(self) {
        let result = measure::<T, R>(self.rng, self.min_duration);
        println!(
            "{} - {}: {} iteration/msec {} in {} milliseconds, epsilon={:e}, measured={:e}",
            result.mean,
            self.tier,
            result.batches * INNER_ITERATIONS / result.millis.max(1),
            result.batches,
            result.millis,
            self.tier.epsilon().to_f64(),
            measured_epsilon::<T>()
        );
    }
}

fn main() -> Result<(), failure::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = args();
    let min_duration = u64::from_str(matches.value_of(DURATION).unwrap_or("1000"))?;
    let tiers = match matches.values_of(TIERS) {
        Some(names) => names.map(Tier::from_str).collect::<Result<Vec<_>, _>>()?,
        None => Tier::ALL.to_vec(),
    };

    let mut rng = rand::thread_rng();
    for tier in tiers {
        tier.visit(Benchmark {
            tier,
            rng: &mut rng,
            min_duration,
        });
    }
    Ok(())
}
