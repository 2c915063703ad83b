//! Formatting front ends for [`Mfrc522ClassicLog`](crate::Mfrc522ClassicLog). Each takes the
//! logger first, then the usual `format!` arguments.

#[macro_export]
macro_rules! output {
  ($log: expr, $($arg: tt)+) => {
    $log.output(format_args!($($arg)+))
  };
}

#[macro_export]
macro_rules! warning {
  ($log: expr, $($arg: tt)+) => {
    $log.warning(format_args!($($arg)+))
  };
}

#[macro_export]
macro_rules! error {
  ($log: expr, $($arg: tt)+) => {
    $log.error(format_args!($($arg)+))
  };
}
