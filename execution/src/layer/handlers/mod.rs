mod cards;
mod rounds;
mod teams;
mod trading;
