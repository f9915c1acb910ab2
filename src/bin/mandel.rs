// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate crossbeam;
extern crate env_logger;
extern crate failure;
extern crate image;
#[macro_use]
extern crate log;
extern crate mandelzoom;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use crossbeam::channel::unbounded;
use failure::format_err;
use image::RgbaImage;
use mandelzoom::numeric::tier::parse_precision;
use mandelzoom::{Engine, EngineConfig, Real, Viewport};
use std::str::FromStr;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const SCREEN_SIZE: &str = "screen-size";
const PRECISION: &str = "precision";
const THREADS: &str = "threads";
const ITERATIONS: &str = "iterations";
const ZOOM: &str = "zoom";
const PAN: &str = "pan";

// One mouse-wheel step.
const ZOOM_STEP: f64 = 0.9;

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandel")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Adaptive-precision Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output PNG file"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("1024x768")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(CENTER)
                .required(false)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-0.60,0")
                .validator(|s| validate_pair::<Real>(&s, ',', "Could not parse center point"))
                .help("Center of the view, as decimal x,y at any precision"),
        )
        .arg(
            Arg::with_name(SCREEN_SIZE)
                .required(false)
                .long(SCREEN_SIZE)
                .takes_value(true)
                .default_value("2.0")
                .validator(|s| match Real::from_str(&s) {
                    Ok(size) if size > Real::zero() => Ok(()),
                    Ok(_) => Err("Screen size must be positive".to_string()),
                    Err(_) => Err("Could not parse screen size".to_string()),
                })
                .help("Height of the view on the complex plane"),
        )
        .arg(
            Arg::with_name(PRECISION)
                .required(false)
                .long(PRECISION)
                .short("p")
                .takes_value(true)
                .default_value("auto")
                .validator(|s| parse_precision(&s).map(|_| ()).map_err(|e| e.to_string()))
                .help("Arithmetic tier: auto, f32, f64, dd32, dd64, big128 or big256"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of render workers; defaults to one per CPU"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("2048")
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iterations before a point counts as inside the set"),
        )
        .arg(
            Arg::with_name(PAN)
                .required(false)
                .long(PAN)
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("0,0")
                .validator(|s| match parse_pair::<f64>(&s, ',') {
                    Some((dx, dy)) if dx.is_finite() && dy.is_finite() => Ok(()),
                    _ => Err("Could not parse pan offset".to_string()),
                })
                .help("Move the center by dx,dy screen heights before zooming"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .required(false)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .default_value("0")
                .validator(move |s| {
                    validate_range(
                        &s,
                        0u32,
                        2000,
                        "Could not parse zoom steps",
                        "Zoom steps must be between 0 and 2000",
                    )
                })
                .help("Zoom in this many wheel steps about the center"),
        )
        .get_matches()
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, failure::Error> {
    matches
        .value_of(name)
        .ok_or_else(|| format_err!("missing --{}", name))
}

// Pixels are 0x00RRGGBB little-endian words; PNG wants opaque RGBA.
fn write_image(outfile: &str, pixels: &[u8], bounds: (usize, usize)) -> Result<(), failure::Error> {
    let rgba: Vec<u8> = pixels
        .chunks(4)
        .flat_map(|bgra| vec![bgra[2], bgra[1], bgra[0], 255])
        .collect();
    let image = RgbaImage::from_raw(bounds.0 as u32, bounds.1 as u32, rgba)
        .ok_or_else(|| format_err!("pixel buffer does not match {}x{}", bounds.0, bounds.1))?;
    image.save(outfile)?;
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<(), failure::Error> {
    let (width, height) = parse_pair::<usize>(value(matches, SIZE)?, 'x')
        .ok_or_else(|| format_err!("Error parsing image dimensions"))?;
    let (center_x, center_y) = parse_pair::<Real>(value(matches, CENTER)?, ',')
        .ok_or_else(|| format_err!("Error parsing center point"))?;
    let screen_size = Real::from_str(value(matches, SCREEN_SIZE)?)?;
    let forced = parse_precision(value(matches, PRECISION)?)?;
    let threads = match matches.value_of(THREADS) {
        Some(threads) => usize::from_str(threads)?,
        None => num_cpus::get(),
    };
    let limit = u32::from_str(value(matches, ITERATIONS)?)?;
    let zoom = u32::from_str(value(matches, ZOOM)?)?;
    let (pan_x, pan_y) = parse_pair::<f64>(value(matches, PAN)?, ',')
        .ok_or_else(|| format_err!("Error parsing pan offset"))?;

    let mut viewport = Viewport::new(center_x, center_y, screen_size);
    viewport.pan(pan_x, pan_y);
    for _ in 0..zoom {
        viewport.zoom_at(width as i64 / 2, height as i64 / 2, width, height, ZOOM_STEP)?;
    }

    let (sender, receiver) = unbounded();
    let mut engine = Engine::new(EngineConfig { threads, limit }, width, height, sender)?;
    engine.set_viewport(viewport)?;
    engine.set_precision(forced);
    let jobs = engine.jobs_per_cycle();
    engine.start_render();
    println!("{}", engine.current_precision_tier_name());

    let step = (jobs / 8).max(1);
    for (done, _) in receiver.iter().take(jobs).enumerate() {
        if (done + 1) % step == 0 {
            debug!("{} of {} rows", done + 1, jobs);
        }
    }
    engine.wait_render();

    write_image(value(matches, OUTPUT)?, &engine.snapshot(), (width, height))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
