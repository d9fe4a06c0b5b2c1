/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Invocations of the instrumented compiler.
	Compile,
	/// Single runs of a compiled cell binary.
	Execute,
	/// Long-running minimizer sessions.
	Localize,
	/// Filesystem work such as writing variant sources.
	Io,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Compile => "compile",
			Self::Execute => "execute",
			Self::Localize => "localize",
			Self::Io => "io",
		}
	}
}
