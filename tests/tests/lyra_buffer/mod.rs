mod end_of_stream;
mod failures;
mod live_retry;
mod periods;
mod seek;
mod track_switch;
