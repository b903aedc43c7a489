macro_rules! emit {
    ($generator:expr, $opcode:expr) => {
        writeln!($generator.output(), "\t{}", $opcode)
    };

    ($generator:expr, $opcode:expr, $($format:tt)*) => {{
        write!($generator.output(), "\t{:8}", $opcode)?;
        writeln!($generator.output(), $($format)*)
    }};
}
