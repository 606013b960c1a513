pub mod delta;
pub mod normalize;
pub mod sampler;
pub mod state;

pub use delta::{counter_delta, counter_delta_width};
pub use normalize::{normalization_factor, normalize, IntervalTimer, TimerScope};
pub use sampler::{DomainSample, DomainSampler, SampleContext, UnitSample};
pub use state::{
    AggregateTotals, CounterLayout, CounterRegister, FixedCounter, NormalizedCounts, RawReadings,
    SampleUnit, UnitCounterState, MAX_SLOTS,
};
