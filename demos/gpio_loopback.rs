// gpio_loopback.rs - Pulses one GPIO pin while a second thread counts the
// falling edges on another pin that's wired to it.
//
// Connect BCM GPIO 23 (physical pin 16) to BCM GPIO 24 (physical pin 18),
// preferably through a 1 kΩ resistor to protect both pins in case of a
// misconfiguration.
//
// The watcher busy-waits, so it occupies a CPU core until all pulses have been
// sent, or a SIGINT (Ctrl-C) or SIGTERM signal is caught. Pulses are spaced
// out, because a preempted watcher thread can't observe a pulse that was
// shorter than the time it wasn't running.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use simple_signal::{self, Signal};

use fastpin::gpio::{FastPin, GpioMem, Level, Mode, Trigger};

// Gpio uses BCM pin numbering.
const GPIO_OUTPUT: u8 = 23;
const GPIO_INPUT: u8 = 24;

const PULSES: usize = 1000;

static RUNNING: AtomicBool = AtomicBool::new(true);

fn main() -> Result<(), Box<dyn Error>> {
    let gpio = GpioMem::open()?;

    let mut output = FastPin::with_mode_and_level(&gpio, GPIO_OUTPUT, Mode::Output, Level::High);
    let input = FastPin::with_mode(&gpio, GPIO_INPUT, Mode::Input);

    // When a SIGINT (Ctrl-C) or SIGTERM signal is caught, atomically set RUNNING to false.
    simple_signal::set_handler(&[Signal::Int, Signal::Term], |_| {
        RUNNING.store(false, Ordering::SeqCst);
    });

    let seen = thread::scope(|s| {
        let watcher = s.spawn(move || {
            let mut seen = 0;

            while seen < PULSES && RUNNING.load(Ordering::SeqCst) {
                // Check RUNNING regularly instead of blocking indefinitely.
                if input.wait_for_edge(Trigger::FallingEdge, Some(Duration::from_millis(100))) {
                    seen += 1;
                }
            }

            seen
        });

        for _ in 0..PULSES {
            if !RUNNING.load(Ordering::SeqCst) {
                break;
            }

            output.pulse_low();
            thread::sleep(Duration::from_millis(1));
        }

        // Give the watcher a moment to catch the last pulse, then stop it.
        thread::sleep(Duration::from_millis(200));
        RUNNING.store(false, Ordering::SeqCst);

        watcher.join()
    });

    match seen {
        Ok(seen) => println!("Sent {} pulses, observed {} falling edges", PULSES, seen),
        Err(_) => return Err("watcher thread panicked".into()),
    }

    output.set_mode(Mode::Input);

    Ok(())
}
